pub mod console;
pub mod model;
pub mod serialize;
pub mod writer;

use crate::app::aggregate::RunSummary;
use crate::app::error::Error;
use crate::app::unit::Category;
use crate::configuration::settings::ReportSettings;
use crate::reporter::model::{FindingsReport, PerformanceReport, SummaryReport};
use crate::reporter::writer::write_atomic;
use crate::time::file_stamp;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SUMMARY_PREFIX: &str = "test_summary";

#[derive(Debug)]
pub enum ReportError {
    Io(io::Error),
    Serialize(serde_json::Error),
    Build(String),
}

impl std::error::Error for ReportError {}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "i/o error: {}", e),
            ReportError::Serialize(e) => write!(f, "serialization error: {}", e),
            ReportError::Build(e) => write!(f, "incomplete report: {}", e),
        }
    }
}

impl From<io::Error> for ReportError {
    fn from(e: io::Error) -> Self {
        ReportError::Io(e)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        ReportError::Serialize(e)
    }
}

/// Artifacts of one `report` call. A failed artifact never hides the others.
#[derive(Debug, Default)]
pub struct ReportOutcome {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, ReportError)>,
}

impl ReportOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Reporter {
    dir: PathBuf,
    pretty: bool,
}

impl Reporter {
    /// Creates the reports directory and proves it writable before any unit
    /// runs.
    pub fn prepare(settings: &ReportSettings) -> Result<Self, Error> {
        let dir = settings.dir.clone();
        let probe = std::fs::create_dir_all(&dir).and_then(|_| NamedTempFile::new_in(&dir));
        match probe {
            Ok(_) => Ok(Self {
                dir,
                pretty: settings.pretty,
            }),
            Err(source) => Err(Error::ReportsDir { path: dir, source }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the summary plus one detail artifact per executed category,
    /// all sharing the run's timestamp suffix.
    pub fn report(&self, summary: &RunSummary) -> ReportOutcome {
        let stamp = self.stamp(summary);
        let mut outcome = ReportOutcome::default();

        let file_name = format!("{}_{}.json", SUMMARY_PREFIX, stamp);
        let written = SummaryReport::from_summary(summary)
            .map_err(ReportError::Build)
            .and_then(|report| write_atomic(&self.dir, &file_name, &report, self.pretty));
        self.record(&mut outcome, file_name, written);

        for result in summary.categories.iter().filter(|c| c.started) {
            let file_name = format!("{}_report_{}.json", result.category, stamp);
            let written = match result.category {
                Category::Performance => PerformanceReport::from_category(summary, result)
                    .map_err(ReportError::Build)
                    .and_then(|report| write_atomic(&self.dir, &file_name, &report, self.pretty)),
                _ => FindingsReport::from_category(summary, result)
                    .map_err(ReportError::Build)
                    .and_then(|report| write_atomic(&self.dir, &file_name, &report, self.pretty)),
            };
            self.record(&mut outcome, file_name, written);
        }
        outcome
    }

    /// The start time to the second, extended with the run id when an
    /// earlier run in the same second already claimed that name.
    fn stamp(&self, summary: &RunSummary) -> String {
        let stamp = file_stamp(&summary.started_at);
        if self.dir.join(format!("{}_{}.json", SUMMARY_PREFIX, stamp)).exists() {
            let id = summary.run_id.to_simple().to_string();
            format!("{}_{}", stamp, &id[..8])
        } else {
            stamp
        }
    }

    fn record(&self, outcome: &mut ReportOutcome, file_name: String, written: Result<PathBuf, ReportError>) {
        match written {
            Ok(path) => {
                info!("Report written to {}", path.display());
                outcome.written.push(path);
            }
            Err(e) => {
                let path = self.dir.join(file_name);
                error!("Failed to write report {}: {}", path.display(), e);
                outcome.failures.push((path, e));
            }
        }
    }
}
