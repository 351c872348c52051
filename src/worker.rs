//! Message-bus worker: scores transactions from NATS and publishes verdicts.

use crate::config::AppConfig;
use crate::consumer::{decode_request, TransactionConsumer};
use crate::detector::Detector;
use crate::error::DetectorError;
use crate::metrics::{MetricsReporter, ScoringMetrics};
use crate::producer::VerdictProducer;
use crate::types::verdict::VerdictMessage;
use anyhow::Result;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Score one message payload; every payload gets a reply.
pub fn score_payload(
    detector: &Detector,
    metrics: &ScoringMetrics,
    payload: &[u8],
) -> VerdictMessage {
    let start_time = Instant::now();

    let request = match decode_request(payload) {
        Ok(request) => request,
        Err((request_id, err)) => {
            warn!(error = %err, "Failed to decode transaction");
            metrics.record_rejection(err.code());
            let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            return VerdictMessage::failed(request_id, &err);
        }
    };

    match detector.check(&request.transaction) {
        Ok(verdict) => {
            let processing_time = start_time.elapsed();
            metrics.record_verdict(processing_time, verdict);
            debug!(
                request_id = %request.request_id,
                verdict = %verdict,
                processing_time_us = processing_time.as_micros(),
                "Transaction scored"
            );
            VerdictMessage::scored(request.request_id, verdict)
        }
        Err(err) => {
            metrics.record_rejection(err.code());
            if err.is_input_error() {
                warn!(request_id = %request.request_id, error = %err, "Transaction rejected");
            } else {
                error!(request_id = %request.request_id, error = %err, "Inference failed");
            }
            VerdictMessage::failed(request.request_id, &err)
        }
    }
}

/// Score a payload on tokio's blocking pool.
pub async fn score_blocking<P>(
    detector: Arc<Detector>,
    metrics: Arc<ScoringMetrics>,
    payload: P,
) -> VerdictMessage
where
    P: AsRef<[u8]> + Send + 'static,
{
    tokio::task::spawn_blocking(move || score_payload(&detector, &metrics, payload.as_ref()))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "Scoring task failed");
            let err = DetectorError::inference("worker", e);
            VerdictMessage::failed(Uuid::new_v4().to_string(), &err)
        })
}

/// Wait for every in-flight scoring task.
async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Scoring task panicked");
        }
    }
}

/// Consume transactions until the subscription ends.
pub async fn run(config: AppConfig, detector: Detector) -> Result<()> {
    let metrics = Arc::new(ScoringMetrics::new());
    let detector = Arc::new(detector);

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(client.clone(), &config.nats.transaction_subject);
    let producer = Arc::new(VerdictProducer::new(client, &config.nats.verdict_subject));

    let num_workers = config.pipeline.workers;
    info!(
        workers = num_workers,
        transactions = %consumer.subject(),
        verdicts = %producer.subject(),
        "Starting transaction scoring loop"
    );

    // Semaphore to limit concurrent scoring
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.report_interval_secs);
    let reporter_handle = tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;
    let mut tasks = JoinSet::new();

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let detector = detector.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tasks.spawn(async move {
            let reply = score_blocking(detector, metrics.clone(), message.payload.clone()).await;

            if let Err(e) = producer.publish(&reply, message.reply.as_ref()).await {
                error!(
                    request_id = %reply.request_id,
                    error = %e,
                    "Failed to publish verdict"
                );
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} tx/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });

        // Reap finished tasks
        while tasks.try_join_next().is_some() {}
    }

    reporter_handle.abort();
    info!(in_flight = tasks.len(), "Worker shutting down...");
    drain(&mut tasks).await;
    metrics.print_summary();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as DetectorResult;
    use crate::feature_extractor::{FeatureExtractor, UnknownCategoryPolicy};
    use crate::models::inference::{check_features, Classifier};
    use crate::types::verdict::Verdict;

    struct AlwaysFraud;

    impl Classifier for AlwaysFraud {
        fn predict(&self, features: &[f32]) -> DetectorResult<Verdict> {
            check_features(features, 53)?;
            Ok(Verdict::Fraudulent)
        }

        fn name(&self) -> &str {
            "always_fraud"
        }

        fn feature_count(&self) -> usize {
            53
        }
    }

    fn detector() -> Detector {
        Detector::new(
            Arc::new(AlwaysFraud),
            FeatureExtractor::new(),
            UnknownCategoryPolicy::Reject,
        )
    }

    #[test]
    fn test_scored_payload() {
        let metrics = ScoringMetrics::new();
        let payload = br#"{"request_id":"r1","amount":99.0,"date":"2024-02-29",
            "transaction_type":"Purchase","payment_gateway":"HDFC",
            "transaction_state":"Assam","merchant_category":"Travel bookings"}"#;

        let reply = score_payload(&detector(), &metrics, payload);
        assert_eq!(reply.request_id, "r1");
        assert_eq!(reply.verdict, Some(Verdict::Fraudulent));
        assert_eq!(reply.fraud.as_deref(), Some("Yes"));
        assert_eq!(metrics.transactions_scored.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_rejected_payload_gets_error_reply() {
        let metrics = ScoringMetrics::new();
        let payload = br#"{"request_id":"r2","amount":5.0,"date":"2024-02-01",
            "transaction_type":"Gift","payment_gateway":"HDFC",
            "transaction_state":"Assam","merchant_category":"Other"}"#;

        let reply = score_payload(&detector(), &metrics, payload);
        assert_eq!(reply.request_id, "r2");
        assert!(reply.verdict.is_none());
        assert!(reply.error.unwrap().contains("UPI-2002"));
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
    }

    fn payload(id: usize) -> Vec<u8> {
        format!(
            r#"{{"request_id":"r{id}","amount":10.0,"date":"2024-01-05",
            "transaction_type":"Purchase","payment_gateway":"Paytm",
            "transaction_state":"Goa","merchant_category":"Utilities"}}"#
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn test_blocking_scoring_replies() {
        let metrics = Arc::new(ScoringMetrics::new());
        let reply = score_blocking(Arc::new(detector()), metrics.clone(), payload(1)).await;

        assert_eq!(reply.request_id, "r1");
        assert_eq!(reply.verdict, Some(Verdict::Fraudulent));
        assert_eq!(metrics.transactions_scored.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_drain_waits_for_in_flight_scoring() {
        let detector = Arc::new(detector());
        let metrics = Arc::new(ScoringMetrics::new());
        let mut tasks = JoinSet::new();

        for id in 0..8 {
            let detector = detector.clone();
            let metrics = metrics.clone();
            tasks.spawn(async move {
                let reply = score_blocking(detector, metrics, payload(id)).await;
                assert_eq!(reply.request_id, format!("r{id}"));
            });
        }
        drain(&mut tasks).await;

        assert!(tasks.is_empty());
        assert_eq!(metrics.transactions_scored.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn test_undecodable_payload_gets_generated_id() {
        let metrics = ScoringMetrics::new();
        let reply = score_payload(&detector(), &metrics, b"{}");
        assert!(Uuid::parse_str(&reply.request_id).is_ok());
        assert!(reply.is_error());
    }
}
