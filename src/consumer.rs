//! NATS message consumer for incoming transactions

use crate::error::DetectorError;
use crate::types::transaction::TransactionRequest;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use serde::Deserialize;
use tracing::info;

/// Consumer for receiving transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    /// Create a new transaction consumer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Only the correlation id of a payload, used to answer undecodable requests.
#[derive(Deserialize)]
struct RequestId {
    request_id: Option<String>,
}

/// Decode a message payload.
///
/// On failure the request id is recovered when the payload is at least a JSON
/// object carrying one, so the sender still gets an error reply.
pub fn decode_request(
    payload: &[u8],
) -> std::result::Result<TransactionRequest, (Option<String>, DetectorError)> {
    serde_json::from_slice::<TransactionRequest>(payload).map_err(|e| {
        let request_id = serde_json::from_slice::<RequestId>(payload)
            .ok()
            .and_then(|r| r.request_id);
        (
            request_id,
            DetectorError::invalid_input("payload", e.to_string()),
        )
    })
}
