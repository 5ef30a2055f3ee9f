//! The self-checking harness loop.
//!
//! [`run_harness`] builds the classic bench from configuration and runs it;
//! [`run_with`] does the same for any [`ClockedArbiter`] and
//! [`StimulusSource`], which is how tests drive deliberately broken
//! devices.
//!
//! # Per-edge ordering
//!
//! 1. Check the run bounds; stop before the edge if any has tripped.
//! 2. The arbiter registers its grant from the request on the wire.
//! 3. The port values are published for the monitor.
//! 4. The tick is broadcast. The driver applies the request for the next
//!    edge and the monitor samples the grant just computed.
//! 5. The loop waits until both have settled, then paces.
//!
//! The checker is not on the tick bus. It consumes the sample queue at its
//! own pace and drains it after the monitor stops.

use std::sync::Arc;

use arbiter_types::{GrantVector, Mismatch, RequestVector, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::arbiter::{ArbiterError, ClockedArbiter, FixedPriorityArbiter};
use crate::clock::{ClockError, SimClock};
use crate::config::{ConfigError, HarnessConfig};
use crate::coverage::Coverage;
use crate::driver::{Driver, DriverError};
use crate::monitor::{Monitor, MonitorError, PortSnapshot};
use crate::operator::{RunControl, RunEndReason};
use crate::queue::sample_queue;
use crate::scoreboard::{ReferenceModel, Scoreboard, ScoreboardReport, ScoreboardStats};
use crate::stimulus::{self, StimulusError, StimulusSource};
use crate::tick::{TickBus, TickBusError};

/// Errors that abort a harness run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The configuration is unusable.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The clock failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The arbiter rejected its input.
    #[error("arbiter error: {source}")]
    Arbiter {
        /// The underlying arbiter error.
        #[from]
        source: ArbiterError,
    },

    /// The stimulus source could not be built.
    #[error("stimulus error: {source}")]
    Stimulus {
        /// The underlying stimulus error.
        #[from]
        source: StimulusError,
    },

    /// Device, stimulus and configuration disagree on the number of lines.
    #[error("width mismatch: arbiter has {arbiter} requesters, stimulus drives {stimulus}")]
    WidthMismatch {
        /// Arbiter width.
        arbiter: usize,
        /// Stimulus width.
        stimulus: usize,
    },

    /// The tick bus failed.
    #[error("tick bus error: {source}")]
    TickBus {
        /// The underlying tick bus error.
        #[from]
        source: TickBusError,
    },

    /// The driver process failed.
    #[error("driver error: {source}")]
    Driver {
        /// The underlying driver error.
        #[from]
        source: DriverError,
    },

    /// The monitor process failed.
    #[error("monitor error: {source}")]
    Monitor {
        /// The underlying monitor error.
        #[from]
        source: MonitorError,
    },

    /// A process task panicked or was cancelled.
    #[error("{process} task failed: {source}")]
    Task {
        /// Which process.
        process: &'static str,
        /// The join error.
        source: JoinError,
    },
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessReport {
    /// Identifier of this run.
    pub run_id: RunId,
    /// Why the run stopped.
    pub end_reason: RunEndReason,
    /// Number of request lines.
    pub requesters: usize,
    /// Expectation basis used by the checker.
    pub reference_model: ReferenceModel,
    /// Clock edges executed.
    pub total_ticks: u64,
    /// Simulated time of the last edge executed.
    pub final_time_ns: Option<u64>,
    /// Requests applied by the driver (one more than the edges it saw).
    pub requests_applied: u64,
    /// Samples enqueued by the monitor.
    pub samples_observed: u64,
    /// Samples the checker compared.
    pub samples_checked: u64,
    /// Whether the checker saw the samples in tick order without gaps.
    pub samples_in_order: bool,
    /// Total mismatches.
    pub mismatch_count: u64,
    /// The first recorded mismatches.
    pub mismatches: Vec<Mismatch>,
    /// Functional coverage.
    pub coverage: Coverage,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
}

impl HarnessReport {
    /// `true` if no mismatch was found.
    pub const fn passed(&self) -> bool {
        self.mismatch_count == 0
    }
}

/// Build the configured arbiter and stimulus and run them.
///
/// # Errors
///
/// Returns [`HarnessError`] on invalid configuration or if a process fails.
pub async fn run_harness(
    config: &HarnessConfig,
    control: &Arc<RunControl>,
) -> Result<HarnessReport, HarnessError> {
    config.validate()?;
    let arbiter = FixedPriorityArbiter::new(config.arbiter.requesters)?;
    let stimulus = stimulus::from_config(config)?;
    run_with(Box::new(arbiter), stimulus, config, control).await
}

/// Run the harness around an arbitrary device and stimulus source.
///
/// Only the clock, reset, run and checker sections of `config` are read.
///
/// # Errors
///
/// Returns [`HarnessError::WidthMismatch`] if the device and stimulus
/// disagree on width, or the first error raised by the tick loop or a
/// process.
pub async fn run_with(
    mut arbiter: Box<dyn ClockedArbiter>,
    stimulus: Box<dyn StimulusSource>,
    config: &HarnessConfig,
    control: &Arc<RunControl>,
) -> Result<HarnessReport, HarnessError> {
    let width = arbiter.requesters();
    if stimulus.width() != width {
        return Err(HarnessError::WidthMismatch {
            arbiter: width,
            stimulus: stimulus.width(),
        });
    }

    let started_at = Utc::now();
    let mut clock = SimClock::new(&config.clock, &config.reset)?;
    let run_id = RunId::new();
    let model = config.checker.reference_model;

    let idle_request = RequestVector::zeros(width).map_err(ArbiterError::from)?;
    let (request_tx, request_rx) = watch::channel(idle_request.clone());
    let (ports_tx, ports_rx) = watch::channel(PortSnapshot {
        tick: 0,
        reset: clock.reset_level(0),
        request: idle_request,
        grant: arbiter.grant().clone(),
    });
    let (queue_tx, queue_rx) = sample_queue();
    let mut bus = TickBus::new();
    let stats = Arc::new(ScoreboardStats::default());

    let checker = tokio::spawn(Scoreboard::new(model, width, Arc::clone(&stats)).run(queue_rx));
    let monitor = tokio::spawn(Monitor::new(ports_rx, bus.subscribe("monitor"), queue_tx).run());
    let driver = tokio::spawn(Driver::new(stimulus, request_tx, bus.subscribe("driver")).run());

    info!(
        %run_id,
        requesters = width,
        reference_model = ?model,
        period_ns = clock.period_ns(),
        reset_release_ns = clock.reset_release_ns(),
        duration_ns = control.duration_ns(),
        max_ticks = control.max_ticks(),
        max_wall_seconds = control.max_wall_seconds(),
        "Harness starting"
    );

    let mut loop_state = TickLoop {
        arbiter: arbiter.as_mut(),
        clock: &mut clock,
        bus: &mut bus,
        request_rx: &request_rx,
        ports_tx: &ports_tx,
        control,
        total_ticks: 0,
        final_time_ns: None,
    };
    let outcome = loop_state.run().await;
    let (total_ticks, final_time_ns) = (loop_state.total_ticks, loop_state.final_time_ns);

    // Dropping the bus ends the driver and monitor; the monitor drops the
    // queue sender, which lets the checker drain and finish.
    drop(bus);
    let driver_result = join("driver", driver).await;
    let monitor_result = join("monitor", monitor).await;
    let checker_result = join("checker", checker).await;

    // A process failure explains a tick-loop failure better than the
    // "subscriber exited" the loop saw, so report it first.
    let requests_applied = driver_result??;
    let samples_observed = monitor_result??;
    let board = checker_result?;
    let end_reason = outcome?;

    Ok(build_report(
        run_id,
        end_reason,
        width,
        total_ticks,
        final_time_ns,
        requests_applied,
        samples_observed,
        board,
        started_at,
    ))
}

/// Log the end of a run.
pub fn log_harness_end(report: &HarnessReport) {
    info!(
        run_id = %report.run_id,
        reason = ?report.end_reason,
        total_ticks = report.total_ticks,
        final_time_ns = report.final_time_ns,
        samples_checked = report.samples_checked,
        mismatches = report.mismatch_count,
        grant_coverage_percent = report.coverage.grant_coverage_percent(),
        "Harness ended"
    );

    let holes = report.coverage.holes();
    if !holes.is_empty() {
        warn!(requesters = ?holes, "Requesters never granted");
    }
    if report.passed() {
        info!(reference_model = ?report.reference_model, "All samples matched");
    } else {
        warn!(
            mismatches = report.mismatch_count,
            first_tick = report.mismatches.first().map(|m| m.tick),
            "Run failed"
        );
    }
}

/// Borrowed state for the tick loop.
struct TickLoop<'a> {
    /// The device under test.
    arbiter: &'a mut dyn ClockedArbiter,
    /// Simulated clock.
    clock: &'a mut SimClock,
    /// Tick broadcast.
    bus: &'a mut TickBus,
    /// Request wire written by the driver.
    request_rx: &'a watch::Receiver<RequestVector>,
    /// Port snapshot read by the monitor.
    ports_tx: &'a watch::Sender<PortSnapshot>,
    /// Run bounds.
    control: &'a RunControl,
    /// Edges executed.
    total_ticks: u64,
    /// Time of the last edge executed.
    final_time_ns: Option<u64>,
}

impl TickLoop<'_> {
    /// Run edges until a bound trips.
    async fn run(&mut self) -> Result<RunEndReason, HarnessError> {
        // Elaboration: the driver has its first request on the wire.
        self.bus.settle().await?;

        loop {
            if let Some(reason) = self.bound_reached()? {
                info!(
                    reason = ?reason,
                    total_ticks = self.total_ticks,
                    "Run bound reached"
                );
                return Ok(reason);
            }

            let tick = self.clock.advance()?;
            let request = self.request_rx.borrow().clone();
            let grant: GrantVector = self.arbiter.clock_edge(&request, tick.reset)?.clone();
            debug!(
                tick = tick.index,
                time_ns = tick.time_ns,
                reset = ?tick.reset,
                request = %request,
                grant = %grant,
                "Clock edge"
            );
            self.ports_tx.send_replace(PortSnapshot {
                tick: tick.index,
                reset: tick.reset,
                request,
                grant,
            });

            self.bus.fire(tick).await?;
            self.total_ticks = self.total_ticks.saturating_add(1);
            self.final_time_ns = Some(tick.time_ns);

            self.control.pace().await;
        }
    }

    /// Check every run bound, in order of precedence.
    fn bound_reached(&self) -> Result<Option<RunEndReason>, HarnessError> {
        if self.control.is_stop_requested() {
            return Ok(Some(RunEndReason::OperatorStop));
        }
        if self.control.tick_limit_reached(self.total_ticks) {
            return Ok(Some(RunEndReason::MaxTicksReached));
        }
        // An unlimited duration never needs the next edge time, which may
        // not be representable.
        if self.control.duration_ns() > 0
            && self.control.duration_elapsed(self.clock.next_edge_time_ns()?)
        {
            return Ok(Some(RunEndReason::DurationElapsed));
        }
        if self.control.time_limit_reached() {
            return Ok(Some(RunEndReason::MaxWallTimeReached));
        }
        Ok(None)
    }
}

/// Await a process task, mapping panics and cancellation.
async fn join<T>(process: &'static str, handle: JoinHandle<T>) -> Result<T, HarnessError> {
    handle
        .await
        .map_err(|source| HarnessError::Task { process, source })
}

/// Assemble the final report.
#[allow(clippy::too_many_arguments)]
fn build_report(
    run_id: RunId,
    end_reason: RunEndReason,
    requesters: usize,
    total_ticks: u64,
    final_time_ns: Option<u64>,
    requests_applied: u64,
    samples_observed: u64,
    board: ScoreboardReport,
    started_at: DateTime<Utc>,
) -> HarnessReport {
    HarnessReport {
        run_id,
        end_reason,
        requesters,
        reference_model: board.reference_model,
        total_ticks,
        final_time_ns,
        requests_applied,
        samples_observed,
        samples_checked: board.checked,
        samples_in_order: board.in_order,
        mismatch_count: board.mismatch_count,
        mismatches: board.mismatches,
        coverage: board.coverage,
        started_at,
        finished_at: Utc::now(),
    }
}
