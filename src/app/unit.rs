use crate::app::context::UnitContext;
use crate::app::error::Error;
use crate::connection::DriverError;
use serde_derive::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Functional,
    Performance,
    Security,
    Validation,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Functional,
        Category::Performance,
        Category::Security,
        Category::Validation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Functional => "functional",
            Category::Performance => "performance",
            Category::Security => "security",
            Category::Validation => "validation",
        }
    }

    /// Only performance units simulate concurrent clients; everything else
    /// assumes exclusive access to shared fixtures.
    pub fn is_concurrent(self) -> bool {
        self == Category::Performance
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownCategory(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
    Error,
    Skipped,
}

impl Status {
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Fail | Status::Error)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Error => "ERROR",
            Status::Skipped => "SKIPPED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Assertion,
    Exception,
    Panic,
    Timeout,
    Resource,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDetail {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One check inside a unit, as security and validation reports list them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub check: String,
    pub status: Status,
    pub details: String,
}

impl Finding {
    pub fn pass<C: Into<String>, D: Into<String>>(check: C, details: D) -> Self {
        Self {
            check: check.into(),
            status: Status::Pass,
            details: details.into(),
        }
    }

    pub fn fail<C: Into<String>, D: Into<String>>(check: C, details: D) -> Self {
        Self {
            check: check.into(),
            status: Status::Fail,
            details: details.into(),
        }
    }

    pub fn expect<C: Into<String>, D: Into<String>>(passed: bool, check: C, details: D) -> Self {
        if passed {
            Self::pass(check, details)
        } else {
            Self::fail(check, details)
        }
    }
}

pub type Metrics = BTreeMap<String, f64>;

/// What a unit body decided. Timing is added by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    status: Status,
    metrics: Metrics,
    findings: Vec<Finding>,
    detail: Option<ErrorDetail>,
}

impl Verdict {
    fn of(status: Status, detail: Option<ErrorDetail>) -> Self {
        Self {
            status,
            metrics: Metrics::new(),
            findings: Vec::new(),
            detail,
        }
    }

    pub fn pass() -> Self {
        Self::of(Status::Pass, None)
    }

    pub fn fail<S: Into<String>>(message: S) -> Self {
        Self::of(Status::Fail, Some(ErrorDetail::new(ErrorKind::Assertion, message)))
    }

    pub fn skipped<S: Into<String>>(reason: S) -> Self {
        Self::of(Status::Skipped, Some(ErrorDetail::new(ErrorKind::Cancelled, reason)))
    }

    /// FAIL when any finding failed, PASS otherwise.
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let failed: Vec<&str> = findings
            .iter()
            .filter(|f| f.status.is_failure())
            .map(|f| f.check.as_str())
            .collect();
        let mut verdict = if failed.is_empty() {
            Self::pass()
        } else {
            Self::fail(format!(
                "{} of {} checks failed: {}",
                failed.len(),
                findings.len(),
                failed.join(", ")
            ))
        };
        verdict.findings = findings;
        verdict
    }

    pub fn metric<K: Into<String>>(mut self, key: K, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn finding(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct UnitResult {
    pub status: Status,
    pub duration: Duration,
    #[builder(default)]
    pub metrics: Metrics,
    #[builder(default)]
    pub findings: Vec<Finding>,
    #[builder(default)]
    pub detail: Option<ErrorDetail>,
}

impl UnitResult {
    pub fn builder() -> UnitResultBuilder {
        UnitResultBuilder::default()
    }

    pub fn from_verdict(verdict: Verdict, duration: Duration) -> Self {
        Self {
            status: verdict.status,
            duration,
            metrics: verdict.metrics,
            findings: verdict.findings,
            detail: verdict.detail,
        }
    }

    pub fn error<S: Into<String>>(kind: ErrorKind, message: S, duration: Duration) -> Self {
        Self {
            status: Status::Error,
            duration,
            metrics: Metrics::new(),
            findings: Vec::new(),
            detail: Some(ErrorDetail::new(kind, message)),
        }
    }

    pub fn skipped<S: Into<String>>(reason: S) -> Self {
        Self::from_verdict(Verdict::skipped(reason), Duration::default())
    }
}

/// Unexpected trouble inside a unit body. The executor records it as ERROR.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitError {
    Driver(DriverError),
    Fixture(String),
    Cancelled,
}

impl UnitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UnitError::Driver(DriverError::Connection(_)) | UnitError::Driver(DriverError::Closed) => {
                ErrorKind::Resource
            }
            UnitError::Driver(_) | UnitError::Fixture(_) => ErrorKind::Exception,
            UnitError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl std::error::Error for UnitError {}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnitError::Driver(e) => write!(f, "database error: {}", e),
            UnitError::Fixture(reason) => write!(f, "fixture error: {}", reason),
            UnitError::Cancelled => write!(f, "cancelled before completion"),
        }
    }
}

impl From<DriverError> for UnitError {
    fn from(e: DriverError) -> Self {
        UnitError::Driver(e)
    }
}

pub type UnitOutcome = Result<Verdict, UnitError>;

/// A single named test case.
pub trait SuiteUnit: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, ctx: &UnitContext) -> UnitOutcome;
}

pub struct FnUnit<F> {
    name: String,
    body: F,
}

impl<F> SuiteUnit for FnUnit<F>
where
    F: Fn(&UnitContext) -> UnitOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &UnitContext) -> UnitOutcome {
        (self.body)(ctx)
    }
}

/// Wraps a closure as a registrable unit.
pub fn unit<N, F>(name: N, body: F) -> Arc<dyn SuiteUnit>
where
    N: Into<String>,
    F: Fn(&UnitContext) -> UnitOutcome + Send + Sync + 'static,
{
    Arc::new(FnUnit {
        name: name.into(),
        body,
    })
}
