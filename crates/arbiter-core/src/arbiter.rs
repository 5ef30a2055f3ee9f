//! The fixed-priority arbiter.
//!
//! Requester 0 has the highest priority. At every clock edge the arbiter
//! scans the request lines from index 0 upward and grants the first one
//! that is set; all other grant lines go low. While reset is held every
//! grant line is low regardless of the requests.
//!
//! The decision depends only on the requests at the current edge. The
//! registered grant is the arbiter's only state and never feeds back into
//! the next decision, so there is no rotation and no starvation avoidance.

use arbiter_types::{BitsError, GrantVector, RequestVector, ResetLevel};

/// Errors raised by an arbiter.
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    /// An arbiter needs at least one requester.
    #[error("arbiter must have at least one requester")]
    NoRequesters,

    /// A request bundle did not match the arbiter's width.
    #[error("request width mismatch: {source}")]
    Width {
        /// The underlying width error.
        #[from]
        source: BitsError,
    },
}

/// Grant the lowest-indexed asserted request.
///
/// This is the combinational rule behind [`FixedPriorityArbiter`]. It is
/// total: an all-zero request yields an all-zero grant of the same width.
pub fn priority_select(request: &RequestVector) -> GrantVector {
    GrantVector::from_bits(request.bits().isolate_lowest())
}

/// A clocked arbiter driven by the harness.
///
/// The harness calls [`clock_edge`](Self::clock_edge) once per rising edge
/// with the request lines as they stand at that edge.
pub trait ClockedArbiter: Send {
    /// Number of requesters this device arbitrates between.
    fn requesters(&self) -> usize;

    /// Register the next grant from `request` and `reset`.
    ///
    /// # Errors
    ///
    /// Returns [`ArbiterError::Width`] if `request` is not
    /// [`requesters`](Self::requesters) bits wide.
    fn clock_edge(
        &mut self,
        request: &RequestVector,
        reset: ResetLevel,
    ) -> Result<&GrantVector, ArbiterError>;

    /// The currently registered grant.
    fn grant(&self) -> &GrantVector;
}

/// Static-priority arbiter with a registered grant output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPriorityArbiter {
    /// Registered grant lines. Starts, and resets to, all-zero.
    grant: GrantVector,
}

impl FixedPriorityArbiter {
    /// Create an arbiter for `requesters` request lines.
    ///
    /// # Errors
    ///
    /// Returns [`ArbiterError::NoRequesters`] if `requesters` is 0.
    pub fn new(requesters: usize) -> Result<Self, ArbiterError> {
        let grant = GrantVector::zeros(requesters).map_err(|_zero| ArbiterError::NoRequesters)?;
        Ok(Self { grant })
    }
}

impl ClockedArbiter for FixedPriorityArbiter {
    fn requesters(&self) -> usize {
        self.grant.width()
    }

    fn clock_edge(
        &mut self,
        request: &RequestVector,
        reset: ResetLevel,
    ) -> Result<&GrantVector, ArbiterError> {
        request.bits().ensure_width(self.grant.width())?;
        self.grant = match reset {
            ResetLevel::Asserted => GrantVector::from_bits(self.grant.bits().cleared()),
            ResetLevel::Released => priority_select(request),
        };
        Ok(&self.grant)
    }

    fn grant(&self) -> &GrantVector {
        &self.grant
    }
}
