//! Test Transaction Producer
//!
//! Generates and publishes random UPI transactions to NATS for worker testing.

use chrono::{Duration as ChronoDuration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};
use upi_fraud_detector::categories::{
    MERCHANT_CATEGORIES, PAYMENT_GATEWAYS, TRANSACTION_STATES, TRANSACTION_TYPES,
};
use upi_fraud_detector::types::{Transaction, TransactionRequest};

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate an everyday transaction
    fn generate_regular(&mut self) -> Transaction {
        let amount = self.rng.gen_range(10.0..2_000.0_f64);
        self.generate(amount)
    }

    /// Generate an unusually large transaction
    fn generate_large(&mut self) -> Transaction {
        let amount = self.rng.gen_range(20_000.0..200_000.0_f64);
        self.generate(amount)
    }

    fn generate(&mut self, amount: f64) -> Transaction {
        let days_ago = self.rng.gen_range(0..365);
        let date = (Utc::now() - ChronoDuration::days(days_ago)).date_naive();

        Transaction::new(
            (amount * 100.0).round() / 100.0,
            date,
            self.random_choice(TRANSACTION_TYPES),
            self.random_choice(PAYMENT_GATEWAYS),
            self.random_choice(TRANSACTION_STATES),
            self.random_choice(MERCHANT_CATEGORIES),
        )
    }

    fn random_choice(&mut self, choices: &[&'static str]) -> &'static str {
        choices.choose(&mut self.rng).copied().unwrap_or("Other")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("upi.transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let large_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        large_rate = large_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, large_rate, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} transactions...", count);

    let mut regular_count = 0;
    let mut large_count = 0;

    for i in 0..count {
        let transaction = if rng.gen_bool(large_rate) {
            large_count += 1;
            generator.generate_large()
        } else {
            regular_count += 1;
            generator.generate_regular()
        };

        let payload = serde_json::to_vec(&TransactionRequest::new(transaction))?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} transactions ({} regular, {} large)",
                i + 1,
                count,
                regular_count,
                large_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Published {} transactions ({} regular, {} large)",
        count, regular_count, large_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, large_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(large_rate) {
            generator.generate_large()
        } else {
            generator.generate_regular()
        };

        let json = serde_json::to_string_pretty(&TransactionRequest::new(transaction))?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
