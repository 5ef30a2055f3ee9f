//! Bench binary for the priority arbiter verification harness.
//!
//! Loads configuration, runs one self-checking simulation of the
//! fixed-priority arbiter and prints the final report as JSON on stdout.
//! The process exits non-zero if the checker found any mismatch.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, or
//!    `arbiter-config.yaml` if present, or built-in defaults
//! 2. Initialize structured logging (tracing)
//! 3. Create run control and install the Ctrl-C handler
//! 4. Run the harness
//! 5. Log and print the report

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arbiter_core::config::{HarnessConfig, LogFormat, LoggingConfig};
use arbiter_core::harness::{self, HarnessReport};
use arbiter_core::operator::RunControl;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::BenchError;

/// Config file looked up in the working directory when no path is given.
const DEFAULT_CONFIG_PATH: &str = "arbiter-config.yaml";

/// Application entry point for the bench.
///
/// # Errors
///
/// Returns an error if configuration fails, the harness fails, or the run
/// found mismatches.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path(std::env::args().nth(1));
    let config = load_config(config_path.as_deref())?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        path = config_path.as_ref().map(|p| p.display().to_string()),
        requesters = config.arbiter.requesters,
        period_ns = config.clock.period_ns,
        seed = config.stimulus.seed,
        mode = ?config.stimulus.mode,
        "Configuration loaded"
    );

    // 3. Run control.
    let control = Arc::new(RunControl::new(config.clock.tick_interval_ms, &config.run));
    spawn_stop_on_ctrl_c(Arc::clone(&control));

    // 4. Run.
    let report = harness::run_harness(&config, &control)
        .await
        .map_err(BenchError::from)?;

    // 5. Report.
    harness::log_harness_end(&report);
    println!("{}", render_report(&report)?);
    verdict(&report)?;
    Ok(())
}

/// Resolve which config file to load, if any.
fn config_path(arg: Option<String>) -> Option<PathBuf> {
    arg.map(PathBuf::from).or_else(|| {
        let default = Path::new(DEFAULT_CONFIG_PATH);
        default.exists().then(|| default.to_path_buf())
    })
}

/// Load configuration from `path`, or defaults with environment overrides.
fn load_config(path: Option<&Path>) -> Result<HarnessConfig, BenchError> {
    if let Some(path) = path {
        return Ok(HarnessConfig::from_file(path)?);
    }
    let mut config = HarnessConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

/// Request a clean stop on the first Ctrl-C.
fn spawn_stop_on_ctrl_c(control: Arc<RunControl>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping before the next edge");
                control.request_stop();
            }
            Err(e) => warn!(error = %e, "failed to install Ctrl-C handler"),
        }
    });
}

/// Serialize the report for stdout.
fn render_report(report: &HarnessReport) -> Result<String, BenchError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Turn a failed run into an error so the process exits non-zero.
const fn verdict(report: &HarnessReport) -> Result<(), BenchError> {
    if report.passed() {
        Ok(())
    } else {
        Err(BenchError::Mismatches {
            run_id: report.run_id,
            count: report.mismatch_count,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use arbiter_core::config::RunConfig;

    use super::*;

    #[test]
    fn explicit_path_wins() {
        assert_eq!(
            config_path(Some("custom.yaml".to_owned())),
            Some(PathBuf::from("custom.yaml"))
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_config(Some(Path::new("no/such/arbiter-config.yaml"))).unwrap_err();
        assert!(matches!(err, BenchError::Config { .. }));
    }

    #[tokio::test]
    async fn failed_run_becomes_an_error() {
        let mut config = HarnessConfig::default();
        config.run = RunConfig {
            duration_ns: 100,
            max_ticks: 0,
            max_wall_seconds: 0,
        };
        let control = Arc::new(RunControl::new(0, &config.run));
        let mut report = harness::run_harness(&config, &control).await.unwrap();
        assert!(verdict(&report).is_ok());

        report.mismatch_count = 3;
        let err = verdict(&report).unwrap_err();
        assert!(matches!(err, BenchError::Mismatches { count: 3, .. }));
        assert!(err.to_string().contains("3 grant mismatch"));
    }

    #[tokio::test]
    async fn report_renders_as_json() {
        let mut config = HarnessConfig::default();
        config.run.duration_ns = 30;
        let control = Arc::new(RunControl::new(0, &config.run));
        let report = harness::run_harness(&config, &control).await.unwrap();
        let text = render_report(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["total_ticks"], 3);
        assert_eq!(value["mismatch_count"], 0);
    }
}
