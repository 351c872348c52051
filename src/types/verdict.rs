//! Verdict data structures

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// Binary outcome of scoring one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NotFraudulent,
    Fraudulent,
}

impl Verdict {
    /// Map a classifier label to a verdict; only 0 and 1 are labels.
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            0 => Some(Verdict::NotFraudulent),
            1 => Some(Verdict::Fraudulent),
            _ => None,
        }
    }

    /// Verdict for a fraud-class probability at the given cut-off.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            Verdict::Fraudulent
        } else {
            Verdict::NotFraudulent
        }
    }

    pub fn label(self) -> u8 {
        match self {
            Verdict::NotFraudulent => 0,
            Verdict::Fraudulent => 1,
        }
    }

    pub fn is_fraud(self) -> bool {
        self == Verdict::Fraudulent
    }

    /// Value of the `fraud` column in exported CSVs.
    pub fn as_flag(self) -> &'static str {
        match self {
            Verdict::NotFraudulent => "No",
            Verdict::Fraudulent => "Yes",
        }
    }

    /// Sentence shown to users after a single check.
    pub fn message(self) -> &'static str {
        match self {
            Verdict::NotFraudulent => "This transaction is not fraudulent.",
            Verdict::Fraudulent => "Alert! This transaction is fraudulent.",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NotFraudulent => f.write_str("not fraudulent"),
            Verdict::Fraudulent => f.write_str("fraudulent"),
        }
    }
}

/// Reply published for every transaction received over the message bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictMessage {
    /// Correlation id of the originating request
    pub request_id: String,

    /// Verdict, absent when scoring failed
    pub verdict: Option<Verdict>,

    /// `Yes`/`No`, absent when scoring failed
    pub fraud: Option<String>,

    /// Error description when scoring failed
    pub error: Option<String>,

    /// Reply generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl VerdictMessage {
    /// Reply for a successfully scored transaction
    pub fn scored(request_id: String, verdict: Verdict) -> Self {
        Self {
            request_id,
            verdict: Some(verdict),
            fraud: Some(verdict.as_flag().to_string()),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Reply for a transaction that could not be scored
    pub fn failed(request_id: String, error: &DetectorError) -> Self {
        Self {
            request_id,
            verdict: None,
            fraud: None,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
