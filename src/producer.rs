//! NATS message producer for verdicts

use crate::types::verdict::VerdictMessage;
use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::debug;

/// Producer for publishing verdicts to NATS
#[derive(Clone)]
pub struct VerdictProducer {
    client: Client,
    subject: String,
}

impl VerdictProducer {
    /// Create a new verdict producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a verdict to `reply` when the request asked for one, otherwise
    /// to the configured verdict subject
    pub async fn publish(&self, verdict: &VerdictMessage, reply: Option<&Subject>) -> Result<()> {
        let payload = serde_json::to_vec(verdict)?;
        let subject = reply
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.subject.clone());

        self.client.publish(subject.clone(), payload.into()).await?;

        debug!(
            request_id = %verdict.request_id,
            subject = %subject,
            fraud = ?verdict.fraud,
            "Published verdict"
        );

        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
