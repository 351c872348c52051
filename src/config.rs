//! Configuration management for the fraud detector

use crate::feature_extractor::UnknownCategoryPolicy;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    pub nats: NatsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the ONNX export of the classifier
    pub path: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Fraud-class probability cut-off, used when the model has no label output
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_onnx_threads() -> usize {
    1
}

fn default_threshold() -> f64 {
    0.5
}

/// Detection configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionConfig {
    /// Policy for categorical values outside their enumeration
    #[serde(default)]
    pub unknown_category: UnknownCategoryPolicy,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject for outgoing verdicts (when the request has no reply subject)
    pub verdict_subject: String,
}

/// Worker configuration for the message-bus mode
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of transactions scored concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

fn default_report_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values the detector cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.model.threshold) {
            anyhow::bail!(
                "model.threshold must be within [0, 1], got {}",
                self.model.threshold
            );
        }
        if self.model.onnx_threads == 0 {
            anyhow::bail!("model.onnx_threads must be at least 1");
        }
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                path: "models/upi_fraud.onnx".to_string(),
                onnx_threads: 1,
                threshold: 0.5,
            },
            detection: DetectionConfig::default(),
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "upi.transactions".to_string(),
                verdict_subject: "upi.verdicts".to_string(),
            },
            pipeline: PipelineConfig {
                workers: 4,
                report_interval_secs: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.model.threshold, 0.5);
        assert_eq!(config.detection.unknown_category, UnknownCategoryPolicy::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[model]
path = "models/custom.onnx"
threshold = 0.7

[detection]
unknown_category = "zero_fill"

[nats]
url = "nats://bus:4222"
transaction_subject = "tx"
verdict_subject = "verdicts"

[pipeline]
workers = 2

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.model.path, "models/custom.onnx");
        assert_eq!(config.model.onnx_threads, 1);
        assert_eq!(config.model.threshold, 0.7);
        assert_eq!(config.detection.unknown_category, UnknownCategoryPolicy::ZeroFill);
        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.pipeline.report_interval_secs, 30);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_or_default("does/not/exist.toml").unwrap();
        assert_eq!(config.model.path, "models/upi_fraud.onnx");
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut config = AppConfig::default();
        config.model.threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
