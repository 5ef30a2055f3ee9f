//! Configuration loading and typed config structures for the arbiter harness.
//!
//! The canonical configuration lives in `arbiter-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, and
//! provides a loader that reads and validates the file.
//!
//! Every field has a default, so an empty document yields the classic bench:
//! four requesters, a 10 ns clock, reset held for 15 ns and a 1000 ns run.

use std::path::Path;

use arbiter_types::{BitsError, RequestVector};
use serde::Deserialize;

use crate::scoreboard::ReferenceModel;

/// Environment variable that overrides `stimulus.seed`.
pub const SEED_ENV_VAR: &str = "ARBITER_SEED";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes a harness that cannot run.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level harness configuration.
///
/// Mirrors the structure of `arbiter-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HarnessConfig {
    /// Device parameters.
    #[serde(default)]
    pub arbiter: ArbiterConfig,

    /// Clock period and real-time pacing.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Initial reset pulse.
    #[serde(default)]
    pub reset: ResetConfig,

    /// Run bounds.
    #[serde(default)]
    pub run: RunConfig,

    /// Request stimulus.
    #[serde(default)]
    pub stimulus: StimulusConfig,

    /// Reference checker.
    #[serde(default)]
    pub checker: CheckerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HarnessConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `ARBITER_SEED` overrides `stimulus.seed`. The result is validated
    /// before it is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// Environment overrides are not applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not a map.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `ARBITER_SEED` is set but is not
    /// an unsigned integer.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let seed = std::env::var(SEED_ENV_VAR).ok();
        self.stimulus.apply_seed_override(seed.as_deref())
    }

    /// Check the configuration for values that would prevent the harness
    /// from starting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero requesters, a zero clock
    /// period, or a scripted request that is not exactly `requesters` bits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arbiter.requesters == 0 {
            return Err(ConfigError::Invalid {
                reason: "arbiter.requesters must be at least 1".to_owned(),
            });
        }
        if self.clock.period_ns == 0 {
            return Err(ConfigError::Invalid {
                reason: "clock.period_ns must be at least 1".to_owned(),
            });
        }
        if self.stimulus.mode == StimulusMode::Scripted && self.stimulus.script.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "stimulus.script must not be empty in scripted mode".to_owned(),
            });
        }
        self.scripted_requests()?;
        Ok(())
    }

    /// Parse `stimulus.script` into request vectors of the configured width.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first entry that is not a
    /// bit string of exactly `arbiter.requesters` digits.
    pub fn scripted_requests(&self) -> Result<Vec<RequestVector>, ConfigError> {
        let width = self.arbiter.requesters;
        self.stimulus
            .script
            .iter()
            .enumerate()
            .map(|(i, text)| {
                text.parse::<RequestVector>()
                    .and_then(|req| req.bits().ensure_width(width).map(|()| req))
                    .map_err(|e: BitsError| ConfigError::Invalid {
                        reason: format!("stimulus.script[{i}] ({text:?}): {e}"),
                    })
            })
            .collect()
    }
}

/// Device parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArbiterConfig {
    /// Number of requesters `N`.
    #[serde(default = "default_requesters")]
    pub requesters: usize,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            requesters: default_requesters(),
        }
    }
}

/// Clock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClockConfig {
    /// Simulated clock period in nanoseconds.
    #[serde(default = "default_period_ns")]
    pub period_ns: u64,

    /// Real-time milliseconds to sleep between ticks (0 = free-running).
    #[serde(default)]
    pub tick_interval_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            period_ns: default_period_ns(),
            tick_interval_ms: 0,
        }
    }
}

/// Reset pulse configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResetConfig {
    /// Simulated nanoseconds from time zero during which reset is held.
    #[serde(default = "default_reset_duration_ns")]
    pub duration_ns: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            duration_ns: default_reset_duration_ns(),
        }
    }
}

/// Run bounds. A value of 0 disables that bound.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Stop before the first clock edge at or after this simulated time.
    #[serde(default = "default_run_duration_ns")]
    pub duration_ns: u64,

    /// Stop after this many ticks.
    #[serde(default)]
    pub max_ticks: u64,

    /// Stop after this many wall-clock seconds.
    #[serde(default)]
    pub max_wall_seconds: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_ns: default_run_duration_ns(),
            max_ticks: 0,
            max_wall_seconds: 0,
        }
    }
}

/// How request vectors are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusMode {
    /// Uniformly random requests from a seeded generator.
    #[default]
    Random,
    /// Replay `stimulus.script`, then hold all requests low.
    Scripted,
}

/// Stimulus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StimulusConfig {
    /// Stimulus mode.
    #[serde(default)]
    pub mode: StimulusMode,

    /// Seed for the random generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Bit strings replayed in scripted mode, highest index first.
    #[serde(default)]
    pub script: Vec<String>,
}

impl StimulusConfig {
    /// Replace the seed with `value` when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `value` is not a `u64`.
    pub fn apply_seed_override(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        if let Some(raw) = value {
            self.seed = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                reason: format!("{SEED_ENV_VAR}={raw:?} is not a valid seed: {e}"),
            })?;
        }
        Ok(())
    }
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            mode: StimulusMode::Random,
            seed: default_seed(),
            script: Vec::new(),
        }
    }
}

/// Reference checker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CheckerConfig {
    /// Basis the checker uses to recompute the expected grant.
    #[serde(default)]
    pub reference_model: ReferenceModel,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

const fn default_requesters() -> usize {
    4
}

const fn default_period_ns() -> u64 {
    10
}

const fn default_reset_duration_ns() -> u64 {
    15
}

const fn default_run_duration_ns() -> u64 {
    1000
}

const fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.arbiter.requesters, 4);
        assert_eq!(config.clock.period_ns, 10);
        assert_eq!(config.reset.duration_ns, 15);
        assert_eq!(config.run.duration_ns, 1000);
        assert_eq!(config.stimulus.seed, 42);
        assert_eq!(config.checker.reference_model, ReferenceModel::ObservedGrant);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
arbiter:
  requesters: 8

clock:
  period_ns: 20
  tick_interval_ms: 5

reset:
  duration_ns: 40

run:
  duration_ns: 0
  max_ticks: 500
  max_wall_seconds: 30

stimulus:
  mode: scripted
  seed: 7
  script:
    - "0000_0001"
    - "1000_0000"

checker:
  reference_model: request

logging:
  level: "debug"
  format: json
"#;

        let config = HarnessConfig::parse(yaml).unwrap();
        assert_eq!(config.arbiter.requesters, 8);
        assert_eq!(config.clock.period_ns, 20);
        assert_eq!(config.clock.tick_interval_ms, 5);
        assert_eq!(config.reset.duration_ns, 40);
        assert_eq!(config.run.max_ticks, 500);
        assert_eq!(config.stimulus.mode, StimulusMode::Scripted);
        assert_eq!(config.checker.reference_model, ReferenceModel::Request);
        assert_eq!(config.logging.format, LogFormat::Json);

        let script = config.scripted_requests().unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script[1].to_string(), "10000000");
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = HarnessConfig::parse("stimulus:\n  seed: 9\n").unwrap();
        assert_eq!(config.stimulus.seed, 9);
        assert_eq!(config.arbiter.requesters, 4);
        assert_eq!(config.run.duration_ns, 1000);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = HarnessConfig::parse("").unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn zero_requesters_is_fatal() {
        let err = HarnessConfig::parse("arbiter:\n  requesters: 0\n");
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_period_is_fatal() {
        let err = HarnessConfig::parse("clock:\n  period_ns: 0\n");
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn script_width_must_match_requesters() {
        let yaml = "stimulus:\n  mode: scripted\n  script: [\"0101\", \"101\"]\n";
        let err = HarnessConfig::parse(yaml).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("stimulus.script[1]"), "{message}");
    }

    #[test]
    fn scripted_mode_needs_a_script() {
        let err = HarnessConfig::parse("stimulus:\n  mode: scripted\n");
        assert!(matches!(err, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn seed_override() {
        let mut stimulus = StimulusConfig::default();
        stimulus.apply_seed_override(Some(" 1234 ")).unwrap();
        assert_eq!(stimulus.seed, 1234);
        stimulus.apply_seed_override(None).unwrap();
        assert_eq!(stimulus.seed, 1234);
        assert!(stimulus.apply_seed_override(Some("abc")).is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("arbiter-config.yaml");
        if path.exists() {
            let config = HarnessConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
