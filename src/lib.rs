//! UPI Fraud Detector Library
//!
//! Encodes UPI transactions into the feature vector a pre-trained
//! gradient-boosted classifier expects and turns its output into a
//! fraudulent / not-fraudulent verdict, for single transactions, CSV
//! batches and NATS messages.

pub mod batch;
pub mod categories;
pub mod config;
pub mod consumer;
pub mod detector;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod types;
pub mod worker;

pub use batch::{BatchReport, BatchSummary, RowError, ScoredRow};
pub use config::AppConfig;
pub use detector::Detector;
pub use error::{DetectorError, Result};
pub use feature_extractor::{FeatureExtractor, UnknownCategoryPolicy};
pub use models::inference::{Classifier, InferenceEngine};
pub use types::{transaction::Transaction, verdict::Verdict};

/// Sample upload shipped with the detector.
pub const SAMPLE_CSV: &str = include_str!("../data/sample.csv");
