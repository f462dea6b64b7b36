pub(crate) mod aggregate;
pub(crate) mod context;
pub(crate) mod error;
pub(crate) mod executor;
pub(crate) mod registry;
pub(crate) mod result;
pub(crate) mod setup;
pub(crate) mod stats;
pub(crate) mod unit;

use crate::app::aggregate::{aggregate, RunSummary};
use crate::app::context::CancellationToken;
use crate::app::error::Error;
use crate::app::executor::Executor;
use crate::app::registry::Registry;
use crate::app::result::CategoryResult;
use crate::app::unit::{Category, Status, SuiteUnit};
use crate::configuration::constants::exit_code;
use crate::configuration::settings::Settings;
use crate::connection::pool::SessionPool;
use crate::connection::Driver;
use crate::reporter::{console, ReportOutcome, Reporter};
use chrono::Local;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Only(String),
}

impl From<Option<String>> for Selection {
    fn from(suite: Option<String>) -> Self {
        suite.map_or(Selection::All, Selection::Only)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Passed,
    Failed,
    Misconfigured,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Passed => exit_code::PASSED,
            ExitStatus::Failed => exit_code::FAILED,
            ExitStatus::Misconfigured => exit_code::MISCONFIGURED,
        }
    }

    fn of(summary: &RunSummary) -> Self {
        if summary.overall_status() == Status::Pass && !summary.interrupted {
            ExitStatus::Passed
        } else {
            ExitStatus::Failed
        }
    }
}

type Plan<'a> = Vec<(Category, &'a [Arc<dyn SuiteUnit>])>;

pub struct Runner {
    registry: Registry,
    settings: Settings,
    driver: Arc<dyn Driver>,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(registry: Registry, settings: Settings, driver: Arc<dyn Driver>, cancel: CancellationToken) -> Self {
        Self {
            registry,
            settings,
            driver,
            cancel,
        }
    }

    pub fn run(&self, selection: &Selection) -> ExitStatus {
        match self.execute(selection) {
            Ok((summary, _)) => ExitStatus::of(&summary),
            Err(e) => {
                error!("{}", e);
                ExitStatus::Misconfigured
            }
        }
    }

    /// Resolves, prepares, executes, aggregates and reports. Errors are
    /// returned only for failures before the first unit ran.
    pub fn execute(&self, selection: &Selection) -> Result<(RunSummary, ReportOutcome), Error> {
        let plan = self.resolve(selection)?;
        let reporter = Reporter::prepare(&self.settings.reports)?;
        debug!("Writing reports to {}", reporter.dir().display());
        let pool = SessionPool::open(self.driver.clone(), self.settings.execution.workers)?;
        if let Err(e) = setup::prepare(&pool, &self.settings.setup) {
            pool.close();
            return Err(e);
        }

        let started_at = Local::now();
        let executor = Executor::new(
            pool.clone(),
            self.settings.execution.workers,
            self.settings.execution.unit_timeout,
            self.cancel.clone(),
            Arc::new(self.settings.workload.clone()),
        );
        let mut results = Vec::with_capacity(plan.len());
        for (category, units) in plan {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled, skipping the {} suite", category);
                results.push(not_started(category, units));
            } else {
                results.push(executor.execute(category, units));
            }
        }
        pool.close();

        let summary = aggregate(started_at, results);
        let outcome = reporter.report(&summary);
        console::print_summary(&summary, &outcome);
        Ok((summary, outcome))
    }

    fn resolve(&self, selection: &Selection) -> Result<Plan<'_>, Error> {
        match selection {
            Selection::Only(name) => {
                let (category, units) = self.registry.lookup(name)?;
                Ok(vec![(category, units)])
            }
            Selection::All => Ok(self
                .settings
                .run_order()?
                .into_iter()
                .map(|category| (category, self.registry.get(category)))
                .collect()),
        }
    }
}

fn not_started(category: Category, units: &[Arc<dyn SuiteUnit>]) -> CategoryResult {
    let names: Vec<&str> = units.iter().map(|u| u.name()).collect();
    CategoryResult::not_started(category, names.as_slice(), "run cancelled")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::app::unit::{unit, ErrorKind, UnitError, Verdict};
    use crate::connection::memory::MemoryDriver;
    use crate::connection::Filter;
    use std::time::Duration;
    use std::path::Path;
    use std::thread::sleep;

    fn settings(reports: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.reports.dir = reports.to_path_buf();
        settings.execution.workers = 4;
        settings.execution.unit_timeout = Duration::from_millis(300);
        settings
    }

    fn functional_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_all(
                Category::Functional,
                vec![
                    unit("Create", |ctx| {
                        let fixture = ctx.fixture("items")?;
                        ctx.session().insert_one(fixture.name(), doc!({"n": 1}))?;
                        let found = ctx.session().count(fixture.name(), Filter::all())?;
                        check!(found == 1, "expected 1 document, found {}", found);
                        Ok(Verdict::pass())
                    }),
                    unit("Read", |_| Ok(Verdict::pass())),
                    unit("Delete", |_| Ok(Verdict::fail("document still present"))),
                ],
            )
            .unwrap();
        registry
    }

    fn runner(registry: Registry, reports: &Path) -> Runner {
        Runner::new(
            registry,
            settings(reports),
            Arc::new(MemoryDriver::new("runner")),
            CancellationToken::new(),
        )
    }

    fn artifacts(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_mixed_outcomes_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(functional_registry(), dir.path());
        let selection = Selection::Only("functional".into());
        let (summary, outcome) = runner.execute(&selection).unwrap();
        assert_eq!(summary.totals.total, 3);
        assert_eq!(summary.totals.passed, 2);
        assert_eq!(summary.totals.failures(), 1);
        assert_eq!(summary.overall_status(), Status::Fail);
        assert_eq!(outcome.written.len(), 2);
        assert_eq!(runner.run(&selection), ExitStatus::Failed);
        assert_eq!(ExitStatus::Failed.code(), 1);
    }

    #[test]
    fn test_passing_category_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new();
        registry
            .register_all(
                Category::Performance,
                vec![
                    unit("Insert", |_| Ok(Verdict::pass().metric("ops", 10.0))),
                    unit("Query", |_| Ok(Verdict::pass())),
                ],
            )
            .unwrap();
        let runner = runner(registry, dir.path());
        let selection = Selection::Only("Performance".into());
        let (summary, _) = runner.execute(&selection).unwrap();
        assert_eq!(summary.totals.total, 2);
        assert!(summary.performance.is_some());
        assert_eq!(runner.run(&selection), ExitStatus::Passed);
    }

    #[test]
    fn test_unknown_suite_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let runner = runner(functional_registry(), &reports);
        let status = runner.run(&Selection::Only("unknown_category".into()));
        assert_eq!(status, ExitStatus::Misconfigured);
        assert_eq!(status.code(), 2);
        assert_eq!(artifacts(&reports), 0);
    }

    #[test]
    fn test_unreachable_database_is_a_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let driver = MemoryDriver::new("down");
        driver.set_available(false);
        let runner = Runner::new(
            functional_registry(),
            settings(dir.path()),
            Arc::new(driver),
            CancellationToken::new(),
        );
        assert!(matches!(runner.execute(&Selection::All), Err(Error::Setup(_))));
        assert_eq!(artifacts(dir.path()), 0);
    }

    #[test]
    fn test_timed_out_performance_unit_still_reports() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new();
        registry
            .register_all(
                Category::Performance,
                vec![
                    unit("Stuck", |ctx| {
                        while !ctx.is_cancelled() {
                            sleep(Duration::from_millis(5));
                        }
                        Err(UnitError::Cancelled)
                    }),
                    unit("Quick", |_| Ok(Verdict::pass())),
                ],
            )
            .unwrap();
        let runner = runner(registry, dir.path());
        let (summary, outcome) = runner.execute(&Selection::Only("performance".into())).unwrap();
        let units = &summary.categories[0].units;
        assert_eq!(units[0].result.status, Status::Error);
        assert_eq!(units[0].result.detail.as_ref().unwrap().kind, ErrorKind::Timeout);
        assert_eq!(units[1].result.status, Status::Pass);
        assert!(outcome.is_complete());
        for path in &outcome.written {
            let text = std::fs::read_to_string(path).unwrap();
            assert!(serde_json::from_str::<serde_json::Value>(&text).is_ok());
        }
    }

    #[test]
    fn test_repeated_runs_agree() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(functional_registry(), dir.path());
        let (first, _) = runner.execute(&Selection::All).unwrap();
        let (second, _) = runner.execute(&Selection::All).unwrap();
        assert_eq!(first.totals, second.totals);
        assert_eq!(first.overall_status(), second.overall_status());
        let statuses = |s: &RunSummary| -> Vec<Status> {
            s.categories
                .iter()
                .flat_map(|c| c.units.iter().map(|u| u.result.status))
                .collect()
        };
        assert_eq!(statuses(&first), statuses(&second));
        assert_eq!(first.categories.len(), Category::ALL.len());
        assert_eq!(artifacts(dir.path()), 2 * (1 + Category::ALL.len()));
    }

    #[test]
    fn test_cancelled_run_reports_skipped_units() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let runner = Runner::new(
            functional_registry(),
            settings(dir.path()),
            Arc::new(MemoryDriver::new("cancel")),
            cancel.clone(),
        );
        cancel.cancel();
        let (summary, outcome) = runner.execute(&Selection::All).unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.totals.skipped, 3);
        assert_eq!(summary.overall_status(), Status::Pass);
        assert_eq!(ExitStatus::of(&summary), ExitStatus::Failed);
        assert_eq!(summary.categories.len(), Category::ALL.len());
        assert_eq!(outcome.written.len(), 1);
        assert_eq!(artifacts(dir.path()), 1);
    }

    #[test]
    fn test_only_started_categories_get_detail_reports() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let mut registry = Registry::new();
        registry
            .register_all(
                Category::Functional,
                vec![unit("Interrupt", move |_| {
                    token.cancel();
                    Ok(Verdict::pass())
                })],
            )
            .unwrap();
        registry
            .register_all(Category::Security, vec![unit("Never", |_| Ok(Verdict::pass()))])
            .unwrap();
        let runner = Runner::new(
            registry,
            settings(dir.path()),
            Arc::new(MemoryDriver::new("partial")),
            cancel,
        );
        let (summary, outcome) = runner.execute(&Selection::All).unwrap();
        assert!(summary.interrupted);
        assert!(summary.categories[0].started);
        assert!(summary.categories[1..].iter().all(|c| !c.started));
        assert_eq!(summary.categories[2].units[0].result.status, Status::Skipped);
        assert_eq!(outcome.written.len(), 2);
        assert!(outcome.written[1]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("functional_report_"));
    }
}
