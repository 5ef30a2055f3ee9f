//! Records exchanged between the harness processes.

use serde::{Deserialize, Serialize};

use crate::enums::ResetLevel;
use crate::vectors::{GrantVector, RequestVector};

/// One observation taken by the monitor at a clock edge.
///
/// `grant` is what the arbiter registered at this edge; `request` and
/// `reset` are the inputs it saw while doing so.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Zero-based index of the clock edge.
    pub tick: u64,
    /// Simulated time of the edge in nanoseconds.
    pub time_ns: u64,
    /// Reset level at the edge.
    pub reset: ResetLevel,
    /// Request lines evaluated at the edge.
    pub request: RequestVector,
    /// Grant lines registered at the edge.
    pub grant: GrantVector,
}

/// A checker failure: the observed grant disagreed with the reference model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// The clock edge at which the sample was taken.
    pub tick: u64,
    /// Grant lines as observed on the arbiter output.
    pub observed: GrantVector,
    /// Grant lines the reference model expected.
    pub expected: GrantVector,
}
