//! The request driver process.
//!
//! The driver owns the request wire. It applies its first request before
//! the first clock edge, then after every edge applies the request the
//! arbiter will see at the following edge.

use arbiter_types::RequestVector;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::stimulus::{StimulusError, StimulusSource};
use crate::tick::{TickBusError, TickSubscriber};

/// Errors that stop the driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The stimulus source failed.
    #[error("stimulus error: {source}")]
    Stimulus {
        /// The underlying stimulus error.
        #[from]
        source: StimulusError,
    },

    /// The tick subscription failed.
    #[error("tick bus error: {source}")]
    TickBus {
        /// The underlying tick bus error.
        #[from]
        source: TickBusError,
    },
}

/// Request driver.
pub struct Driver {
    /// Where requests come from.
    stimulus: Box<dyn StimulusSource>,
    /// The request wire read by the arbiter at each edge.
    request_wire: watch::Sender<RequestVector>,
    /// Clock subscription.
    ticks: TickSubscriber,
    /// Number of requests applied so far.
    applied: u64,
}

impl core::fmt::Debug for Driver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Driver")
            .field("width", &self.stimulus.width())
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Create a driver.
    pub fn new(
        stimulus: Box<dyn StimulusSource>,
        request_wire: watch::Sender<RequestVector>,
        ticks: TickSubscriber,
    ) -> Self {
        Self {
            stimulus,
            request_wire,
            ticks,
            applied: 0,
        }
    }

    /// Run until the tick bus closes. Returns the number of requests applied.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the stimulus source fails or ticks are
    /// missed.
    pub async fn run(mut self) -> Result<u64, DriverError> {
        self.apply()?;
        self.ticks.settled().await;

        while let Some(tick) = self.ticks.next_tick().await? {
            trace!(tick = tick.index, "driver woke");
            self.apply()?;
            self.ticks.settled().await;
        }

        debug!(applied = self.applied, "driver stopped");
        Ok(self.applied)
    }

    /// Draw the next request and put it on the wire.
    fn apply(&mut self) -> Result<(), DriverError> {
        let request = self.stimulus.next_request()?;
        trace!(request = %request, "applying request");
        self.request_wire.send_replace(request);
        self.applied = self.applied.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arbiter_types::ResetLevel;

    use super::*;
    use crate::clock::Tick;
    use crate::stimulus::ScriptedStimulus;
    use crate::tick::TickBus;

    fn req(s: &str) -> RequestVector {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn first_request_is_on_the_wire_before_the_first_edge() {
        let mut bus = TickBus::new();
        let (wire_tx, wire_rx) = watch::channel(req("0000"));
        let stimulus = ScriptedStimulus::new(4, vec![req("0010"), req("0101")]).unwrap();
        let driver = Driver::new(Box::new(stimulus), wire_tx, bus.subscribe("driver"));
        let handle = tokio::spawn(driver.run());

        bus.settle().await.unwrap();
        assert_eq!(*wire_rx.borrow(), req("0010"));

        bus.fire(Tick {
            index: 0,
            time_ns: 5,
            reset: ResetLevel::Released,
        })
        .await
        .unwrap();
        assert_eq!(*wire_rx.borrow(), req("0101"));

        bus.fire(Tick {
            index: 1,
            time_ns: 15,
            reset: ResetLevel::Released,
        })
        .await
        .unwrap();
        // Script exhausted: lines held low.
        assert_eq!(*wire_rx.borrow(), req("0000"));

        drop(bus);
        assert_eq!(handle.await.unwrap().unwrap(), 3);
    }
}
