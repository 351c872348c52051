//! Scoring metrics and statistics tracking.

use crate::types::verdict::Verdict;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for scored transactions
pub struct ScoringMetrics {
    /// Transactions that received a verdict
    pub transactions_scored: AtomicU64,
    /// Transactions judged fraudulent
    pub fraud_flagged: AtomicU64,
    /// Transactions that could not be scored
    pub rejected: AtomicU64,
    /// Rejections by error code
    rejections_by_code: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            transactions_scored: AtomicU64::new(0),
            fraud_flagged: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            rejections_by_code: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a scored transaction
    pub fn record_verdict(&self, processing_time: Duration, verdict: Verdict) {
        self.transactions_scored.fetch_add(1, Ordering::Relaxed);
        if verdict.is_fraud() {
            self.fraud_flagged.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record a transaction that failed with the given error code
    pub fn record_rejection(&self, code: &str) {
        self.rejected.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_code) = self.rejections_by_code.write() {
            *by_code.entry(code.to_string()).or_insert(0) += 1;
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get rejections by error code
    pub fn get_rejections_by_code(&self) -> HashMap<String, u64> {
        self.rejections_by_code
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Share of scored transactions judged fraudulent, in percent
    pub fn fraud_rate(&self) -> f64 {
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        if scored == 0 {
            return 0.0;
        }
        self.fraud_flagged.load(Ordering::Relaxed) as f64 / scored as f64 * 100.0
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        let flagged = self.fraud_flagged.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              UPI FRAUD DETECTOR - METRICS SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored: {:>8}  │  Throughput: {:>6.1} tx/s    ║",
            scored,
            self.get_throughput()
        );
        info!(
            "║ Flagged Fraudulent:  {:>8}  │  Fraud Rate: {:>6.1}%        ║",
            flagged,
            self.fraud_rate()
        );
        info!("║ Rejected:            {:>8}                                ║", rejected);
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        let by_code = self.get_rejections_by_code();
        if !by_code.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Rejections by Error Code:                                    ║");
            for (code, count) in &by_code {
                info!("║   {:10}: {:>6}                                          ║", code, count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
