//! The grant monitor process.
//!
//! At every clock edge the harness publishes a [`PortSnapshot`] of the
//! arbiter's ports. The monitor wakes on the same edge, reads the snapshot
//! and pushes exactly one [`Sample`] into the queue, even when the grant
//! has not changed since the previous edge.

use arbiter_types::{GrantVector, RequestVector, ResetLevel, Sample};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::queue::{QueueError, SampleSender};
use crate::tick::{TickBusError, TickSubscriber};

/// Arbiter port values at one clock edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSnapshot {
    /// Edge index the values belong to.
    pub tick: u64,
    /// Reset level at the edge.
    pub reset: ResetLevel,
    /// Request lines the arbiter evaluated.
    pub request: RequestVector,
    /// Grant lines the arbiter registered.
    pub grant: GrantVector,
}

/// Errors that stop the monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The tick subscription failed.
    #[error("tick bus error: {source}")]
    TickBus {
        /// The underlying tick bus error.
        #[from]
        source: TickBusError,
    },

    /// The checker stopped consuming samples.
    #[error("queue error: {source}")]
    Queue {
        /// The underlying queue error.
        #[from]
        source: QueueError,
    },

    /// The published port values belong to a different edge.
    #[error("port snapshot for tick {snapshot} seen at tick {tick}")]
    StaleSnapshot {
        /// The edge being observed.
        tick: u64,
        /// The edge the snapshot was taken at.
        snapshot: u64,
    },
}

/// Grant monitor.
#[derive(Debug)]
pub struct Monitor {
    /// Port values published by the harness at each edge.
    ports: watch::Receiver<PortSnapshot>,
    /// Clock subscription.
    ticks: TickSubscriber,
    /// Queue towards the checker.
    queue: SampleSender,
    /// Number of samples enqueued.
    sampled: u64,
}

impl Monitor {
    /// Create a monitor.
    pub const fn new(
        ports: watch::Receiver<PortSnapshot>,
        ticks: TickSubscriber,
        queue: SampleSender,
    ) -> Self {
        Self {
            ports,
            ticks,
            queue,
            sampled: 0,
        }
    }

    /// Run until the tick bus closes. Returns the number of samples taken.
    ///
    /// Dropping the monitor on return closes the queue, which lets the
    /// checker drain and stop.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] if a tick is missed, the snapshot is stale,
    /// or the checker has gone away.
    pub async fn run(mut self) -> Result<u64, MonitorError> {
        self.ticks.settled().await;

        while let Some(tick) = self.ticks.next_tick().await? {
            let ports = self.ports.borrow_and_update().clone();
            if ports.tick != tick.index {
                return Err(MonitorError::StaleSnapshot {
                    tick: tick.index,
                    snapshot: ports.tick,
                });
            }
            trace!(tick = tick.index, grant = %ports.grant, "sampled grant");
            self.queue.push(Sample {
                tick: tick.index,
                time_ns: tick.time_ns,
                reset: ports.reset,
                request: ports.request,
                grant: ports.grant,
            })?;
            self.sampled = self.sampled.saturating_add(1);
            self.ticks.settled().await;
        }

        debug!(
            sampled = self.sampled,
            queued = self.queue.depth(),
            "monitor stopped"
        );
        Ok(self.sampled)
    }
}
