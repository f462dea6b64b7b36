use crate::app::result::UnitRecord;
use crate::app::unit::Status;
use crate::time::as_millis_f64;
use std::time::Duration;

/// Latency and throughput over the units that passed. Failed, errored and
/// skipped units never contribute.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceStats {
    pub concurrency: usize,
    pub completed: usize,
    pub wall_time: Duration,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    /// Completed units per second of category wall time.
    pub throughput: f64,
}

impl PerformanceStats {
    pub fn from_records(records: &[UnitRecord], wall_time: Duration, concurrency: usize) -> Option<Self> {
        let mut latencies: Vec<f64> = records
            .iter()
            .filter(|r| r.result.status == Status::Pass)
            .map(|r| as_millis_f64(&r.result.duration))
            .collect();
        if latencies.is_empty() {
            return None;
        }
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let completed = latencies.len();
        let secs = wall_time.as_secs_f64();
        Some(Self {
            concurrency,
            completed,
            wall_time,
            mean_latency_ms: latencies.iter().sum::<f64>() / completed as f64,
            p95_latency_ms: percentile(&latencies, 95.0),
            min_latency_ms: latencies[0],
            max_latency_ms: latencies[completed - 1],
            throughput: if secs > 0.0 { completed as f64 / secs } else { 0.0 },
        })
    }
}

/// Nearest-rank percentile over an ascending, non-empty slice.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.max(1).min(sorted.len()) - 1]
}
