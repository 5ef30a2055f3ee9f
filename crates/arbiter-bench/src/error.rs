//! Error types for the bench binary.
//!
//! [`BenchError`] wraps every way a bench invocation can fail, including a
//! run that completed but found mismatches.

/// Top-level error for the bench binary.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: arbiter_core::config::ConfigError,
    },

    /// The harness could not complete the run.
    #[error("harness error: {source}")]
    Harness {
        /// The underlying harness error.
        #[from]
        source: arbiter_core::harness::HarnessError,
    },

    /// The final report could not be serialized.
    #[error("report error: {source}")]
    Report {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The run completed but the checker found mismatches.
    #[error("run {run_id} failed with {count} grant mismatch(es)")]
    Mismatches {
        /// Run identifier.
        run_id: arbiter_types::RunId,
        /// Number of mismatches.
        count: u64,
    },
}
