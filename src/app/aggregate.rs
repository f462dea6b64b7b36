use crate::app::result::{CategoryResult, Counts};
use crate::app::unit::Status;
use chrono::{DateTime, Local};

/// Cross-category view of the performance statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceDigest {
    /// Mean latency weighted by completed units per category.
    pub mean_response_ms: f64,
    pub total_throughput: f64,
    pub completed_units: usize,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub started_at: DateTime<Local>,
    pub categories: Vec<CategoryResult>,
    pub totals: Counts,
    pub performance: Option<PerformanceDigest>,
    pub interrupted: bool,
}

impl RunSummary {
    /// PASS iff no unit in any category failed or errored.
    pub fn overall_status(&self) -> Status {
        if self.categories.iter().any(|c| c.counts.failures() > 0) {
            Status::Fail
        } else {
            Status::Pass
        }
    }
}

pub fn aggregate(started_at: DateTime<Local>, categories: Vec<CategoryResult>) -> RunSummary {
    let mut totals = Counts::default();
    categories.iter().for_each(|c| totals.merge(&c.counts));
    let performance = digest(&categories);
    let interrupted = categories.iter().any(|c| c.interrupted);
    let summary = RunSummary {
        run_id: uuid::Uuid::new_v4(),
        started_at,
        categories,
        totals,
        performance,
        interrupted,
    };
    debug!(
        "Aggregated run {}: {} units, {} passed, {} failed, overall {}",
        summary.run_id,
        summary.totals.total,
        summary.totals.passed,
        summary.totals.failures(),
        summary.overall_status()
    );
    summary
}

/// Only categories that produced statistics contribute; a category without
/// them is left out rather than counted as zero.
fn digest(categories: &[CategoryResult]) -> Option<PerformanceDigest> {
    let stats: Vec<_> = categories.iter().filter_map(|c| c.performance.as_ref()).collect();
    let completed: usize = stats.iter().map(|s| s.completed).sum();
    if completed == 0 {
        return None;
    }
    let weighted: f64 = stats
        .iter()
        .map(|s| s.mean_latency_ms * s.completed as f64)
        .sum();
    Some(PerformanceDigest {
        mean_response_ms: weighted / completed as f64,
        total_throughput: stats.iter().map(|s| s.throughput).sum(),
        completed_units: completed,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::app::result::UnitRecord;
    use crate::app::stats::PerformanceStats;
    use crate::app::unit::{Category, UnitResult};
    use std::time::Duration;

    const OUTCOMES: [Status; 4] = [Status::Pass, Status::Fail, Status::Error, Status::Skipped];

    fn category(category: Category, statuses: &[Status]) -> CategoryResult {
        let units = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                UnitRecord::new(
                    format!("unit_{}", i),
                    UnitResult::builder()
                        .status(*status)
                        .duration(Duration::from_millis(10 + i as u64))
                        .build()
                        .unwrap(),
                )
            })
            .collect();
        CategoryResult::new(category, units, Duration::from_millis(100), 1, false)
    }

    #[test]
    fn test_overall_status_over_every_outcome_combination() {
        for a in OUTCOMES.iter() {
            for b in OUTCOMES.iter() {
                for c in OUTCOMES.iter() {
                    let summary = aggregate(
                        Local::now(),
                        vec![
                            category(Category::Functional, &[*a, *b]),
                            category(Category::Security, &[*c]),
                        ],
                    );
                    let expected = if [a, b, c].iter().any(|s| s.is_failure()) {
                        Status::Fail
                    } else {
                        Status::Pass
                    };
                    assert_eq!(summary.overall_status(), expected, "{:?} {:?} {:?}", a, b, c);
                    assert_eq!(summary.totals.total, 3);
                    assert_eq!(
                        summary.totals.passed + summary.totals.failures() + summary.totals.skipped,
                        3
                    );
                }
            }
        }
    }

    #[test]
    fn test_digest_weights_by_completed_units() {
        let mut fast = category(Category::Performance, &[Status::Pass]);
        fast.performance = Some(PerformanceStats {
            concurrency: 1,
            completed: 1,
            wall_time: Duration::from_secs(1),
            mean_latency_ms: 10.0,
            p95_latency_ms: 10.0,
            min_latency_ms: 10.0,
            max_latency_ms: 10.0,
            throughput: 1.0,
        });
        let mut slow = fast.clone();
        slow.performance = Some(PerformanceStats {
            completed: 3,
            mean_latency_ms: 30.0,
            throughput: 3.0,
            ..fast.performance.clone().unwrap()
        });
        let plain = category(Category::Functional, &[Status::Pass]);

        let summary = aggregate(Local::now(), vec![plain, fast, slow]);
        let digest = summary.performance.unwrap();
        assert!((digest.mean_response_ms - 25.0).abs() < 1e-9);
        assert!((digest.total_throughput - 4.0).abs() < 1e-9);
        assert_eq!(digest.completed_units, 4);
    }

    #[test]
    fn test_no_digest_without_performance_data() {
        let summary = aggregate(
            Local::now(),
            vec![category(Category::Performance, &[Status::Fail])],
        );
        assert!(summary.performance.is_none());
        assert_eq!(summary.overall_status(), Status::Fail);
    }
}
