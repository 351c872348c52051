//! Feature extraction for UPI fraud model inference.
//!
//! This module encodes transactions into the features used when the model
//! was trained: amount, year and month followed by one-hot blocks for the
//! transaction type, payment gateway, state and merchant category.

use serde::Deserialize;

use crate::categories::Vocabulary;
use crate::error::{DetectorError, Result};
use crate::types::transaction::Transaction;

/// Number of leading numeric features (amount, year, month).
const NUMERIC_FEATURES: usize = 3;

/// How to treat a categorical value outside its enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
    /// Fail the transaction with an `UnknownCategory` error
    #[default]
    Reject,
    /// Encode the block as all zeros and score anyway
    ZeroFill,
}

/// Feature extractor that transforms transactions into model input features.
///
/// Features are extracted in the exact order expected by the ONNX model.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    vocabulary: Vocabulary,
}

impl FeatureExtractor {
    /// Create a feature extractor over the UPI vocabulary.
    pub fn new() -> Self {
        Self::with_vocabulary(Vocabulary::upi())
    }

    pub fn with_vocabulary(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Extract features from a transaction.
    ///
    /// Never fails: a categorical value outside its enumeration yields an
    /// all-zero block. Use [`FeatureExtractor::extract_checked`] to reject it.
    pub fn extract(&self, tx: &Transaction) -> Vec<f32> {
        let mut features = Vec::with_capacity(self.feature_count());

        features.push(tx.amount as f32);
        features.push(tx.year() as f32);
        features.push(tx.month() as f32);

        let vocab = &self.vocabulary;
        features.extend(vocab.transaction_types.one_hot(&tx.transaction_type));
        features.extend(vocab.payment_gateways.one_hot(&tx.payment_gateway));
        features.extend(vocab.transaction_states.one_hot(&tx.transaction_state));
        features.extend(vocab.merchant_categories.one_hot(&tx.merchant_category));

        features
    }

    /// Check amount and categorical membership.
    pub fn validate(&self, tx: &Transaction) -> Result<()> {
        self.validate_amount(tx)?;
        self.validate_categories(tx)
    }

    /// Validate according to `policy`, then extract.
    pub fn extract_checked(
        &self,
        tx: &Transaction,
        policy: UnknownCategoryPolicy,
    ) -> Result<Vec<f32>> {
        self.validate_amount(tx)?;
        if policy == UnknownCategoryPolicy::Reject {
            self.validate_categories(tx)?;
        }
        Ok(self.extract(tx))
    }

    fn validate_amount(&self, tx: &Transaction) -> Result<()> {
        // The model takes f32 features; larger amounts would encode as infinity.
        if !(tx.amount as f32).is_finite() {
            return Err(DetectorError::invalid_input(
                "Amount",
                format!("must be a finite number within model range, got {}", tx.amount),
            ));
        }
        if tx.amount < 0.0 {
            return Err(DetectorError::invalid_input(
                "Amount",
                format!("must be non-negative, got {}", tx.amount),
            ));
        }
        Ok(())
    }

    fn validate_categories(&self, tx: &Transaction) -> Result<()> {
        let vocab = &self.vocabulary;
        vocab.transaction_types.check(&tx.transaction_type)?;
        vocab.payment_gateways.check(&tx.payment_gateway)?;
        vocab.transaction_states.check(&tx.transaction_state)?;
        vocab.merchant_categories.check(&tx.merchant_category)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        NUMERIC_FEATURES + self.vocabulary.indicator_count()
    }

    /// Get feature names, in vector order.
    ///
    /// One-hot columns are named `<Column>_<Value>`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.feature_count());
        names.extend(["Amount", "Year", "Month"].map(String::from));
        for set in self.vocabulary.sets() {
            names.extend(set.values().iter().map(|v| format!("{}_{}", set.name(), v)));
        }
        names
    }
}
