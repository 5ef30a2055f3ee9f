//! The sample queue between monitor and checker.
//!
//! An unbounded single-producer/single-consumer FIFO. The monitor pushes
//! one [`Sample`] per clock edge; the checker pops them in exactly that
//! order, suspending while the queue is empty. When the sender is dropped
//! the receiver drains what is left and then reports end of stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arbiter_types::Sample;
use tokio::sync::mpsc;

/// Errors raised by the sample queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The consumer is gone, so the sample cannot be delivered.
    #[error("sample queue closed (tick {tick} undelivered)")]
    Closed {
        /// The tick of the sample that could not be pushed.
        tick: u64,
    },
}

/// Create a connected sender/receiver pair.
pub fn sample_queue() -> (SampleSender, SampleReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicU64::new(0));
    (
        SampleSender {
            tx,
            depth: Arc::clone(&depth),
        },
        SampleReceiver { rx, depth },
    )
}

/// Producer half, owned by the monitor.
#[derive(Debug)]
pub struct SampleSender {
    /// Channel sender.
    tx: mpsc::UnboundedSender<Sample>,
    /// Samples pushed but not yet popped.
    depth: Arc<AtomicU64>,
}

impl SampleSender {
    /// Append `sample` to the queue. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the receiver has been dropped.
    pub fn push(&self, sample: Sample) -> Result<(), QueueError> {
        let tick = sample.tick;
        // Count before sending so a concurrent pop never sees the sample
        // ahead of its increment.
        self.depth.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(sample).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(QueueError::Closed { tick });
        }
        Ok(())
    }

    /// Samples currently waiting in the queue.
    pub fn depth(&self) -> u64 {
        self.depth.load(Ordering::Acquire)
    }
}

/// Consumer half, owned by the checker.
#[derive(Debug)]
pub struct SampleReceiver {
    /// Channel receiver.
    rx: mpsc::UnboundedReceiver<Sample>,
    /// Samples pushed but not yet popped.
    depth: Arc<AtomicU64>,
}

impl SampleReceiver {
    /// Remove the oldest sample, waiting while the queue is empty.
    ///
    /// Returns `None` once the sender is dropped and the queue is drained.
    pub async fn pop(&mut self) -> Option<Sample> {
        let sample = self.rx.recv().await?;
        // Push counts before it sends, so this never underflows; saturate
        // anyway rather than wrap.
        let _ = self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| {
                Some(d.saturating_sub(1))
            });
        Some(sample)
    }

    /// Samples currently waiting in the queue.
    pub fn depth(&self) -> u64 {
        self.depth.load(Ordering::Acquire)
    }
}
