//! Simulated clock and reset line.
//!
//! The clock is the single source of truth for simulated time. It hands out
//! rising edges one at a time and derives the reset level for each edge
//! from the configured reset duration.
//!
//! # Timing model
//!
//! The clock starts low at time 0 and toggles every half period, so rising
//! edge `k` happens at `period / 2 + k * period`. With the default 10 ns
//! period the edges fall at 5, 15, 25 ns and so on. Reset is held for every
//! edge strictly before `reset_release_ns` and released once, for good.
//!
//! All time arithmetic is checked: an edge that would overflow `u64`
//! nanoseconds is an error, never a wrapped timestamp.

use arbiter_types::ResetLevel;

use crate::config::{ClockConfig, ResetConfig};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Simulated time would overflow.
    #[error("simulated time overflow at tick {tick}")]
    TimeOverflow {
        /// The edge index whose timestamp overflowed.
        tick: u64,
    },

    /// Invalid clock configuration (e.g. zero period).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// One rising clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Zero-based edge index.
    pub index: u64,
    /// Simulated time of the edge in nanoseconds.
    pub time_ns: u64,
    /// Reset level sampled at the edge.
    pub reset: ResetLevel,
}

/// Simulated clock with an initial reset pulse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    /// Index of the next edge to hand out.
    next_index: u64,

    /// Clock period in nanoseconds.
    period_ns: u64,

    /// Time at which reset is released.
    reset_release_ns: u64,
}

impl SimClock {
    /// Create a clock from the clock and reset configuration sections.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the period is zero.
    pub fn new(clock: &ClockConfig, reset: &ResetConfig) -> Result<Self, ClockError> {
        Self::from_parts(clock.period_ns, reset.duration_ns)
    }

    /// Create a clock from explicit parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `period_ns` is 0.
    pub fn from_parts(period_ns: u64, reset_release_ns: u64) -> Result<Self, ClockError> {
        if period_ns == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "period_ns must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            next_index: 0,
            period_ns,
            reset_release_ns,
        })
    }

    /// Compute the simulated time of edge `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TimeOverflow`] if the time exceeds `u64::MAX`.
    pub fn edge_time_ns(&self, index: u64) -> Result<u64, ClockError> {
        let half = self.period_ns / 2;
        index
            .checked_mul(self.period_ns)
            .and_then(|t| t.checked_add(half))
            .ok_or(ClockError::TimeOverflow { tick: index })
    }

    /// Simulated time of the edge [`advance`](Self::advance) will return next.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TimeOverflow`] on overflow.
    pub fn next_edge_time_ns(&self) -> Result<u64, ClockError> {
        self.edge_time_ns(self.next_index)
    }

    /// Reset level at simulated time `time_ns`.
    pub const fn reset_level(&self, time_ns: u64) -> ResetLevel {
        if time_ns < self.reset_release_ns {
            ResetLevel::Asserted
        } else {
            ResetLevel::Released
        }
    }

    /// Produce the next rising edge and move the clock past it.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TimeOverflow`] if the edge time or index would
    /// overflow.
    pub fn advance(&mut self) -> Result<Tick, ClockError> {
        let index = self.next_index;
        let time_ns = self.edge_time_ns(index)?;
        self.next_index = index
            .checked_add(1)
            .ok_or(ClockError::TimeOverflow { tick: index })?;
        Ok(Tick {
            index,
            time_ns,
            reset: self.reset_level(time_ns),
        })
    }

    /// Number of edges handed out so far.
    pub const fn ticks_elapsed(&self) -> u64 {
        self.next_index
    }

    /// Return the configured period.
    pub const fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Return the reset release time.
    pub const fn reset_release_ns(&self) -> u64 {
        self.reset_release_ns
    }
}
