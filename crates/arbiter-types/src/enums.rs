//! Enumeration types shared across the harness.

use serde::{Deserialize, Serialize};

/// Level of the reset line at a clock edge.
///
/// The line is active-low on the wire; this type names the logical state so
/// callers never have to remember the polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetLevel {
    /// Reset is held; the arbiter drives all grants low.
    Asserted,
    /// Normal operation.
    Released,
}

impl ResetLevel {
    /// Return `true` while reset is held.
    pub const fn is_asserted(self) -> bool {
        matches!(self, Self::Asserted)
    }
}
