use crate::app::stats::PerformanceStats;
use crate::app::unit::{Category, Status, UnitResult};
use serde_derive::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl Counts {
    pub fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Pass => self.passed += 1,
            Status::Fail => self.failed += 1,
            Status::Error => self.errored += 1,
            Status::Skipped => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: &Counts) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.errored += other.errored;
        self.skipped += other.skipped;
    }

    /// FAIL and ERROR units; the `failed_suites` figure of the summary.
    pub fn failures(&self) -> usize {
        self.failed + self.errored
    }

    pub fn status(&self) -> Status {
        if self.failures() > 0 {
            Status::Fail
        } else {
            Status::Pass
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub name: String,
    pub result: UnitResult,
}

impl UnitRecord {
    pub fn new<S: Into<String>>(name: S, result: UnitResult) -> Self {
        Self {
            name: name.into(),
            result,
        }
    }
}

/// Outcome of one category, units in registration order.
#[derive(Debug, Clone)]
pub struct CategoryResult {
    pub category: Category,
    pub units: Vec<UnitRecord>,
    pub counts: Counts,
    pub duration: Duration,
    pub concurrency: usize,
    pub performance: Option<PerformanceStats>,
    pub interrupted: bool,
    /// False for a category the run was cancelled before reaching.
    pub started: bool,
}

impl CategoryResult {
    pub fn new(
        category: Category,
        units: Vec<UnitRecord>,
        duration: Duration,
        concurrency: usize,
        interrupted: bool,
    ) -> Self {
        let mut counts = Counts::default();
        units.iter().for_each(|u| counts.record(u.result.status));
        let performance = if category.is_concurrent() {
            PerformanceStats::from_records(&units, duration, concurrency)
        } else {
            None
        };
        Self {
            category,
            units,
            counts,
            duration,
            concurrency,
            performance,
            interrupted,
            started: true,
        }
    }

    /// Every unit SKIPPED with `reason`; the category never ran.
    pub fn not_started<S: AsRef<str>>(category: Category, names: &[S], reason: &str) -> Self {
        let units = names
            .iter()
            .map(|name| UnitRecord::new(name.as_ref(), UnitResult::skipped(reason)))
            .collect();
        Self {
            started: false,
            ..Self::new(category, units, Duration::default(), 1, true)
        }
    }

    pub fn status(&self) -> Status {
        self.counts.status()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(name: &str, status: Status) -> UnitRecord {
        UnitRecord::new(
            name,
            UnitResult::builder()
                .status(status)
                .duration(Duration::from_millis(5))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_counts_and_status() {
        let result = CategoryResult::new(
            Category::Security,
            vec![
                record("a", Status::Pass),
                record("b", Status::Skipped),
                record("c", Status::Error),
            ],
            Duration::from_millis(20),
            1,
            false,
        );
        assert_eq!(
            result.counts,
            Counts {
                total: 3,
                passed: 1,
                failed: 0,
                errored: 1,
                skipped: 1
            }
        );
        assert_eq!(result.status(), Status::Fail);
        assert!(result.performance.is_none());
    }

    #[test]
    fn test_skipped_units_do_not_fail_a_category() {
        let result = CategoryResult::new(
            Category::Validation,
            vec![record("a", Status::Pass), record("b", Status::Skipped)],
            Duration::from_millis(1),
            1,
            false,
        );
        assert_eq!(result.status(), Status::Pass);
    }
}
