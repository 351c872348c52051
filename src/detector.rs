//! Application context tying the encoder to a loaded classifier.

use std::io::Read;
use std::sync::Arc;

use tracing::{debug, info};

use crate::batch::{self, BatchReport};
use crate::config::AppConfig;
use crate::error::Result;
use crate::feature_extractor::{FeatureExtractor, UnknownCategoryPolicy};
use crate::models::inference::{Classifier, InferenceEngine};
use crate::types::transaction::Transaction;
use crate::types::verdict::Verdict;

/// Built once at start-up and shared by every request.
#[derive(Clone)]
pub struct Detector {
    extractor: FeatureExtractor,
    classifier: Arc<dyn Classifier>,
    policy: UnknownCategoryPolicy,
}

impl Detector {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        extractor: FeatureExtractor,
        policy: UnknownCategoryPolicy,
    ) -> Self {
        Self {
            extractor,
            classifier,
            policy,
        }
    }

    /// Load the ONNX model named in the configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let extractor = FeatureExtractor::new();
        let engine = InferenceEngine::new(config, extractor.feature_count())?;

        info!(
            model = %engine.name(),
            features = extractor.feature_count(),
            policy = ?config.detection.unknown_category,
            "Detector initialized"
        );

        Ok(Self::new(
            Arc::new(engine),
            extractor,
            config.detection.unknown_category,
        ))
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }

    /// Score a single transaction.
    pub fn check(&self, tx: &Transaction) -> Result<Verdict> {
        let features = self.extractor.extract_checked(tx, self.policy)?;
        let verdict = self.classifier.predict(&features)?;
        debug!(
            amount = tx.amount,
            transaction_type = %tx.transaction_type,
            verdict = %verdict,
            "Transaction checked"
        );
        Ok(verdict)
    }

    /// Score every row of a CSV upload.
    pub fn check_batch<R: Read>(&self, reader: R) -> Result<BatchReport> {
        let rows = batch::read_transactions(reader)?;
        let report = batch::score_rows(rows, &self.extractor, self.classifier.as_ref(), self.policy);
        info!(summary = %report.summary(), "Batch checked");
        Ok(report)
    }
}
