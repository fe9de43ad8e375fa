//! Serving metrics for the prediction endpoint.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the prediction service
pub struct ServingMetrics {
    /// Prediction requests answered successfully
    pub requests_served: AtomicU64,
    /// Prediction requests that failed
    pub requests_failed: AtomicU64,
    /// Rows scored across all requests
    pub rows_predicted: AtomicU64,
    /// Rows labeled as fraud
    pub positive_labels: AtomicU64,
    /// Request latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Rows per runner batch
    batch_sizes: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ServingMetrics {
    pub fn new() -> Self {
        Self {
            requests_served: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            rows_predicted: AtomicU64::new(0),
            positive_labels: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            batch_sizes: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully answered request
    pub fn record_request(&self, latency: Duration, labels: &[u8]) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        self.rows_predicted
            .fetch_add(labels.len() as u64, Ordering::Relaxed);
        let positives = labels.iter().filter(|&&l| l == 1).count() as u64;
        self.positive_labels.fetch_add(positives, Ordering::Relaxed);

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only last 10000
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the number of rows in a runner batch
    pub fn record_batch(&self, rows: usize) {
        if let Ok(mut sizes) = self.batch_sizes.write() {
            sizes.push(rows as u64);
            if sizes.len() > 1000 {
                sizes.drain(0..500);
            }
        }
    }

    pub fn latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Rows in each recent runner batch, oldest first
    pub fn batch_sizes(&self) -> Vec<u64> {
        self.batch_sizes
            .read()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }

    /// Mean rows per runner batch
    pub fn avg_batch_size(&self) -> f64 {
        let Ok(sizes) = self.batch_sizes.read() else {
            return 0.0;
        };
        if sizes.is_empty() {
            return 0.0;
        }
        sizes.iter().sum::<u64>() as f64 / sizes.len() as f64
    }

    /// Requests per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let rows = self.rows_predicted.load(Ordering::Relaxed);
        let positives = self.positive_labels.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests_served: self.requests_served.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            rows_predicted: rows,
            positive_labels: positives,
            positive_rate: if rows > 0 {
                positives as f64 / rows as f64
            } else {
                0.0
            },
            throughput_rps: self.throughput(),
            avg_batch_size: self.avg_batch_size(),
            latency: self.latency_stats(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn print_summary(&self) {
        let s = self.snapshot();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FRAUD CLASSIFIER - SERVING SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests Served: {:>8}  │  Failed: {:>6}  │  {:>6.1} req/s ║",
            s.requests_served, s.requests_failed, s.throughput_rps
        );
        info!(
            "║ Rows Predicted:  {:>8}  │  Fraud Rate: {:>6.1}%             ║",
            s.rows_predicted,
            s.positive_rate * 100.0
        );
        info!(
            "║ Latency (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}      ║",
            s.latency.mean_us, s.latency.p50_us, s.latency.p95_us, s.latency.p99_us
        );
        info!(
            "║ Avg Runner Batch: {:>6.1} rows                                ║",
            s.avg_batch_size
        );
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Request latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Point-in-time view served on `/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_served: u64,
    pub requests_failed: u64,
    pub rows_predicted: u64,
    pub positive_labels: u64,
    pub positive_rate: f64,
    pub throughput_rps: f64,
    pub avg_batch_size: f64,
    pub latency: LatencyStats,
    pub uptime_secs: u64,
}

/// Prints a summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServingMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServingMetrics>, interval_secs: u64) -> Self {
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
