//! Pipeline configuration and its loading from files and the environment.

use std::path::Path;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sampling::normalize_rate;

/// Environment variable prefix, e.g. `TELEMETRY_ENDPOINT`.
pub const ENV_PREFIX: &str = "TELEMETRY";

/// Process-wide pipeline settings.
///
/// With no endpoint, events are still sanitized, broadcast and queued, but
/// never transmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Collector URL. `None` keeps everything local.
    pub endpoint: Option<String>,
    /// When false, `emit` returns before doing any work.
    pub enabled: bool,
    /// Fraction of events forwarded to transport, in `[0, 1]`.
    pub sample_rate: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            enabled: true,
            sample_rate: 1.0,
        }
    }
}

impl PipelineConfig {
    /// Default settings with the given collector endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// Read `TELEMETRY_ENDPOINT`, `TELEMETRY_ENABLED` and
    /// `TELEMETRY_SAMPLE_RATE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(None, environment())
    }

    /// Load a TOML/JSON/YAML file, with the environment layered on top.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::build(Some(path), environment())
    }

    fn build(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("enabled", true)?
            .set_default("sample_rate", 1.0)?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let loaded: PipelineConfig = builder.add_source(env).build()?.try_deserialize()?;
        loaded.validated()
    }

    /// Normalize the record: empty endpoint becomes unset, the sample rate
    /// is clamped into `[0, 1]` (NaN admits everything).
    pub fn normalized(mut self) -> Self {
        self.endpoint = self
            .endpoint
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        self.sample_rate = normalize_rate(self.sample_rate);
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let config = self.normalized();
        if let Some(endpoint) = &config.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::InvalidEndpoint(endpoint.clone()));
            }
        }
        Ok(config)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = PipelineConfig::build(None, env(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.enabled);
        assert_eq!(config.sample_rate, 1.0);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn reads_prefixed_environment() {
        let config = PipelineConfig::build(
            None,
            env(&[
                ("TELEMETRY_ENDPOINT", "https://collector.test/ingest"),
                ("TELEMETRY_ENABLED", "false"),
                ("TELEMETRY_SAMPLE_RATE", "0.25"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.endpoint.as_deref(),
            Some("https://collector.test/ingest")
        );
        assert!(!config.enabled);
        assert_eq!(config.sample_rate, 0.25);
    }

    #[test]
    fn sample_rate_is_clamped() {
        let config =
            PipelineConfig::build(None, env(&[("TELEMETRY_SAMPLE_RATE", "3")])).unwrap();
        assert_eq!(config.sample_rate, 1.0);
    }

    #[test]
    fn empty_endpoint_means_unset() {
        let config = PipelineConfig::build(None, env(&[("TELEMETRY_ENDPOINT", "  ")])).unwrap();
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err =
            PipelineConfig::build(None, env(&[("TELEMETRY_ENDPOINT", "ftp://nope")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(_)));
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "endpoint = \"http://from-file/ingest\"\nsample_rate = 0.5\nenabled = true"
        )
        .unwrap();

        let config = PipelineConfig::build(
            Some(file.path()),
            env(&[("TELEMETRY_SAMPLE_RATE", "0.1")]),
        )
        .unwrap();

        assert_eq!(config.endpoint.as_deref(), Some("http://from-file/ingest"));
        assert_eq!(config.sample_rate, 0.1);
        assert!(config.enabled);
    }

    #[test]
    fn normalized_handles_nan() {
        let config = PipelineConfig {
            sample_rate: f64::NAN,
            ..PipelineConfig::default()
        }
        .normalized();
        assert_eq!(config.sample_rate, 1.0);
    }
}
