//! Run control: the external bound on a harness run.
//!
//! The harness itself never decides to stop. [`RunControl`] holds the
//! limits it checks between clock edges (simulated duration, tick count,
//! wall-clock time) and an operator stop flag that another task, such as a
//! Ctrl-C handler, can raise at any moment.
//!
//! # Architecture
//!
//! All mutable control fields use [`std::sync::atomic`] types so the
//! control can be shared through an [`Arc`](std::sync::Arc) between the tick
//! loop and signal handlers without locks on the hot path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::config::RunConfig;

/// Reason why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEndReason {
    /// The next clock edge would fall at or after `run.duration_ns`.
    DurationElapsed,
    /// `max_ticks` edges have run.
    MaxTicksReached,
    /// Reached the configured `max_wall_seconds` limit.
    MaxWallTimeReached,
    /// [`RunControl::request_stop`] was called.
    OperatorStop,
}

/// Shared run control state.
#[derive(Debug)]
pub struct RunControl {
    /// Raised once by [`request_stop`](Self::request_stop).
    stop_requested: AtomicBool,

    /// Wakes a paced tick loop when a stop is requested.
    stop_notify: Notify,

    /// Real-time pacing between ticks in milliseconds (runtime-adjustable).
    tick_interval_ms: AtomicU64,

    /// Wall-clock time when the run started.
    started_at: DateTime<Utc>,

    /// Simulated-time bound in nanoseconds (0 = unlimited).
    duration_ns: u64,

    /// Edge count bound (0 = unlimited).
    max_ticks: u64,

    /// Wall-clock bound in seconds (0 = unlimited).
    max_wall_seconds: u64,
}

impl RunControl {
    /// Create run control from configuration.
    pub fn new(tick_interval_ms: u64, bounds: &RunConfig) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            tick_interval_ms: AtomicU64::new(tick_interval_ms),
            started_at: Utc::now(),
            duration_ns: bounds.duration_ns,
            max_ticks: bounds.max_ticks,
            max_wall_seconds: bounds.max_wall_seconds,
        }
    }

    /// Request a clean stop before the next clock edge.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
    }

    /// `true` once a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Real-time pause between edges, in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Set the tick interval in milliseconds. Returns the previous value.
    pub fn set_tick_interval_ms(&self, ms: u64) -> u64 {
        self.tick_interval_ms.swap(ms, Ordering::AcqRel)
    }

    /// Sleep for the tick interval, returning early if a stop is requested.
    pub async fn pace(&self) {
        let interval_ms = self.tick_interval_ms();
        if interval_ms == 0 {
            return;
        }
        let notified = self.stop_notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent stop is not lost.
        notified.as_mut().enable();
        if self.is_stop_requested() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(interval_ms)) => {}
            () = notified => {}
        }
    }

    /// Check whether an edge at `edge_time_ns` lies beyond the run duration.
    pub const fn duration_elapsed(&self, edge_time_ns: u64) -> bool {
        self.duration_ns > 0 && edge_time_ns >= self.duration_ns
    }

    /// `true` once `ticks_run` edges satisfy a non-zero `max_ticks`.
    pub const fn tick_limit_reached(&self, ticks_run: u64) -> bool {
        self.max_ticks > 0 && ticks_run >= self.max_ticks
    }

    /// `true` once a non-zero `max_wall_seconds` has elapsed.
    pub fn time_limit_reached(&self) -> bool {
        self.max_wall_seconds > 0 && self.elapsed_seconds() >= self.max_wall_seconds
    }

    /// When this control was created.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Return elapsed seconds since the run started.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        // A clock step backwards gives a negative span.
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Get the configured simulated-time bound.
    pub const fn duration_ns(&self) -> u64 {
        self.duration_ns
    }

    /// Configured edge count bound.
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Get the configured max wall-clock seconds.
    pub const fn max_wall_seconds(&self) -> u64 {
        self.max_wall_seconds
    }
}
