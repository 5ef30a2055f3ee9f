//! Shared type definitions for the priority arbiter harness.
//!
//! # Modules
//!
//! - [`bits`] -- Fixed-width [`BitVector`] storage and its errors
//! - [`vectors`] -- [`RequestVector`] and [`GrantVector`] line bundles
//! - [`enums`] -- [`ResetLevel`]
//! - [`structs`] -- Monitor [`Sample`]s and checker [`Mismatch`] records
//! - [`ids`] -- [`RunId`]

pub mod bits;
pub mod enums;
pub mod ids;
pub mod structs;
pub mod vectors;

// Re-export all public types at crate root for convenience.
pub use bits::{BitVector, BitsError};
pub use enums::ResetLevel;
pub use ids::RunId;
pub use structs::{Mismatch, Sample};
pub use vectors::{GrantVector, RequestVector};
