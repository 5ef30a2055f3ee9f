//! Tick broadcast with per-subscriber settle acknowledgements.
//!
//! The [`TickBus`] is the explicit replacement for a shared clock net. The
//! harness fires each [`Tick`] to every subscriber, then waits until each
//! one acknowledges that it has finished reacting to the edge (a delta
//! cycle). Only then may the next tick fire, which keeps every run
//! deterministic for a given seed.
//!
//! Dropping the bus closes the broadcast: subscribers see
//! [`TickSubscriber::next_tick`] return `None` and shut down.

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::clock::Tick;

/// Broadcast capacity. One tick is in flight at a time; the slack only
/// absorbs scheduling jitter.
const TICK_CHANNEL_CAPACITY: usize = 16;

/// Errors raised on the tick bus.
#[derive(Debug, thiserror::Error)]
pub enum TickBusError {
    /// A subscriber stopped before acknowledging a tick.
    #[error("{name} exited before settling")]
    SubscriberExited {
        /// Name of the subscriber.
        name: &'static str,
    },

    /// A subscriber fell behind and missed ticks.
    #[error("missed {missed} ticks")]
    Lagged {
        /// Number of ticks dropped by the broadcast channel.
        missed: u64,
    },
}

/// Sending side of the tick broadcast, owned by the harness.
#[derive(Debug)]
pub struct TickBus {
    /// Tick broadcast sender.
    ticks: broadcast::Sender<Tick>,
    /// One acknowledgement channel per subscriber.
    acks: Vec<(&'static str, mpsc::Receiver<()>)>,
}

impl Default for TickBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TickBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        let (ticks, _) = broadcast::channel(TICK_CHANNEL_CAPACITY);
        Self {
            ticks,
            acks: Vec::new(),
        }
    }

    /// Register a subscriber. Must be called before the first tick fires.
    pub fn subscribe(&mut self, name: &'static str) -> TickSubscriber {
        let (ack_tx, ack_rx) = mpsc::channel(1);
        self.acks.push((name, ack_rx));
        TickSubscriber {
            name,
            ticks: self.ticks.subscribe(),
            ack: ack_tx,
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.acks.len()
    }

    /// Wait for one acknowledgement from every subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`TickBusError::SubscriberExited`] naming the first
    /// subscriber whose acknowledgement channel closed.
    pub async fn settle(&mut self) -> Result<(), TickBusError> {
        for (name, ack) in &mut self.acks {
            if ack.recv().await.is_none() {
                return Err(TickBusError::SubscriberExited { name: *name });
            }
        }
        Ok(())
    }

    /// Broadcast `tick` and wait for every subscriber to settle.
    ///
    /// # Errors
    ///
    /// Returns [`TickBusError::SubscriberExited`] if a subscriber is gone.
    pub async fn fire(&mut self, tick: Tick) -> Result<(), TickBusError> {
        if self.ticks.send(tick).is_err() {
            // No live receivers: report whichever subscriber went first.
            if let Some((name, _)) = self.acks.first() {
                return Err(TickBusError::SubscriberExited { name: *name });
            }
            return Ok(());
        }
        self.settle().await
    }
}

/// Receiving side of the tick broadcast, owned by one process.
#[derive(Debug)]
pub struct TickSubscriber {
    /// Name used in diagnostics.
    name: &'static str,
    /// Tick broadcast receiver.
    ticks: broadcast::Receiver<Tick>,
    /// Acknowledgement sender.
    ack: mpsc::Sender<()>,
}

impl TickSubscriber {
    /// Return the subscriber name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for the next tick. Returns `Ok(None)` once the bus is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TickBusError::Lagged`] if ticks were dropped; a process
    /// that must see every edge cannot continue after that.
    pub async fn next_tick(&mut self) -> Result<Option<Tick>, TickBusError> {
        match self.ticks.recv().await {
            Ok(tick) => Ok(Some(tick)),
            Err(broadcast::error::RecvError::Closed) => Ok(None),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                Err(TickBusError::Lagged { missed })
            }
        }
    }

    /// Acknowledge the current tick (or, before the first tick, signal that
    /// elaboration is complete).
    pub async fn settled(&self) {
        if self.ack.send(()).await.is_err() {
            debug!(subscriber = self.name, "tick bus closed during settle");
        }
    }
}
