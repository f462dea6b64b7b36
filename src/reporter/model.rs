use crate::app::aggregate::{PerformanceDigest, RunSummary};
use crate::app::result::{CategoryResult, Counts, UnitRecord};
use crate::app::stats::PerformanceStats;
use crate::app::unit::{Category, ErrorDetail, Finding, Metrics, Status};
use crate::reporter::serialize::duration_ms::round;
use chrono::{DateTime, Local};
use serde_derive::Serialize;
use std::time::Duration;

const SUMMARY_RECOMMENDATIONS: &[&str] = &[
    "Review failed test cases and address issues",
    "Monitor performance metrics trends",
    "Implement security recommendations",
    "Maintain data quality standards",
    "Update test cases as system evolves",
];

const FUNCTIONAL_RECOMMENDATIONS: &[&str] = &[
    "Keep CRUD coverage in step with new collections",
    "Add unique indexes where the application assumes uniqueness",
];

const PERFORMANCE_RECOMMENDATIONS: &[&str] = &[
    "Compare latency percentiles against the previous run before releasing",
    "Prefer bulk inserts for large imports",
    "Index fields used by frequent filters",
];

const SECURITY_RECOMMENDATIONS: &[&str] = &[
    "Enable authentication in production environments",
    "Configure SSL/TLS for encrypted connections",
    "Implement proper input validation and sanitization",
    "Use application-level encryption for sensitive data",
    "Regularly update the database to the latest security patches",
    "Monitor database access logs",
    "Implement role-based access control (RBAC)",
];

const VALIDATION_RECOMMENDATIONS: &[&str] = &[
    "Implement comprehensive schema validation for all collections",
    "Use unique indexes to prevent duplicate data",
    "Implement data quality checks in application layer",
    "Run regular data integrity audits",
    "Monitor data quality metrics continuously",
];

fn recommendations(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

#[derive(Debug, Serialize, Clone, Builder)]
pub struct CategoryEntry {
    name: Category,
    status: Status,
    counts: Counts,
    #[serde(with = "crate::reporter::serialize::duration_ms")]
    duration_ms: Duration,
    interrupted: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct DigestEntry {
    mean_response_ms: f64,
    total_throughput: f64,
    completed_units: usize,
}

impl From<&PerformanceDigest> for DigestEntry {
    fn from(digest: &PerformanceDigest) -> Self {
        Self {
            mean_response_ms: round(digest.mean_response_ms),
            total_throughput: round(digest.total_throughput),
            completed_units: digest.completed_units,
        }
    }
}

/// `test_summary_<ts>.json`
#[derive(Debug, Serialize, Clone, Builder)]
pub struct SummaryReport {
    run_id: uuid::Uuid,
    #[serde(with = "crate::reporter::serialize::timestamp")]
    timestamp: DateTime<Local>,
    total_suites: usize,
    passed_suites: usize,
    failed_suites: usize,
    skipped_suites: usize,
    overall_status: Status,
    interrupted: bool,
    categories: Vec<CategoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default = "None")]
    performance: Option<DigestEntry>,
    #[builder(default = "Vec::new()")]
    recommendations: Vec<String>,
}

impl SummaryReport {
    pub fn builder() -> SummaryReportBuilder {
        SummaryReportBuilder::default()
    }

    pub fn from_summary(summary: &RunSummary) -> Result<Self, String> {
        let categories = summary
            .categories
            .iter()
            .map(|c| {
                CategoryEntryBuilder::default()
                    .name(c.category)
                    .status(c.status())
                    .counts(c.counts)
                    .duration_ms(c.duration)
                    .interrupted(c.interrupted)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let overall = summary.overall_status();
        Self::builder()
            .run_id(summary.run_id)
            .timestamp(summary.started_at)
            .total_suites(summary.totals.total)
            .passed_suites(summary.totals.passed)
            .failed_suites(summary.totals.failures())
            .skipped_suites(summary.totals.skipped)
            .overall_status(overall)
            .interrupted(summary.interrupted)
            .categories(categories)
            .performance(summary.performance.as_ref().map(DigestEntry::from))
            .recommendations(if overall == Status::Pass {
                Vec::new()
            } else {
                recommendations(SUMMARY_RECOMMENDATIONS)
            })
            .build()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct LatencyEntry {
    name: String,
    status: Status,
    #[serde(with = "crate::reporter::serialize::duration_ms")]
    latency_ms: Duration,
    metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
}

impl From<&UnitRecord> for LatencyEntry {
    fn from(record: &UnitRecord) -> Self {
        Self {
            name: record.name.clone(),
            status: record.result.status,
            latency_ms: record.result.duration,
            metrics: record.result.metrics.clone(),
            error: record.result.detail.clone(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct StatisticsEntry {
    completed: usize,
    mean_latency_ms: f64,
    p95_latency_ms: f64,
    min_latency_ms: f64,
    max_latency_ms: f64,
    throughput: f64,
}

impl From<&PerformanceStats> for StatisticsEntry {
    fn from(stats: &PerformanceStats) -> Self {
        Self {
            completed: stats.completed,
            mean_latency_ms: round(stats.mean_latency_ms),
            p95_latency_ms: round(stats.p95_latency_ms),
            min_latency_ms: round(stats.min_latency_ms),
            max_latency_ms: round(stats.max_latency_ms),
            throughput: round(stats.throughput),
        }
    }
}

/// `performance_report_<ts>.json`
#[derive(Debug, Serialize, Clone, Builder)]
pub struct PerformanceReport {
    run_id: uuid::Uuid,
    #[serde(with = "crate::reporter::serialize::timestamp")]
    timestamp: DateTime<Local>,
    category: Category,
    status: Status,
    concurrency: usize,
    #[serde(with = "crate::reporter::serialize::duration_ms")]
    duration_ms: Duration,
    counts: Counts,
    units: Vec<LatencyEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default = "None")]
    statistics: Option<StatisticsEntry>,
    #[builder(default = "Vec::new()")]
    recommendations: Vec<String>,
}

impl PerformanceReport {
    pub fn builder() -> PerformanceReportBuilder {
        PerformanceReportBuilder::default()
    }

    pub fn from_category(summary: &RunSummary, result: &CategoryResult) -> Result<Self, String> {
        Self::builder()
            .run_id(summary.run_id)
            .timestamp(summary.started_at)
            .category(result.category)
            .status(result.status())
            .concurrency(result.concurrency)
            .duration_ms(result.duration)
            .counts(result.counts)
            .units(result.units.iter().map(LatencyEntry::from).collect())
            .statistics(result.performance.as_ref().map(StatisticsEntry::from))
            .recommendations(recommendations(PERFORMANCE_RECOMMENDATIONS))
            .build()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct UnitEntry {
    name: String,
    status: Status,
    #[serde(with = "crate::reporter::serialize::duration_ms")]
    duration_ms: Duration,
    findings: Vec<Finding>,
    metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
}

impl From<&UnitRecord> for UnitEntry {
    fn from(record: &UnitRecord) -> Self {
        Self {
            name: record.name.clone(),
            status: record.result.status,
            duration_ms: record.result.duration,
            findings: record.result.findings.clone(),
            metrics: record.result.metrics.clone(),
            error: record.result.detail.clone(),
        }
    }
}

/// `functional_report_<ts>.json`, `security_report_<ts>.json` and
/// `validation_report_<ts>.json`
#[derive(Debug, Serialize, Clone, Builder)]
pub struct FindingsReport {
    run_id: uuid::Uuid,
    #[serde(with = "crate::reporter::serialize::timestamp")]
    timestamp: DateTime<Local>,
    category: Category,
    status: Status,
    counts: Counts,
    #[serde(with = "crate::reporter::serialize::duration_ms")]
    duration_ms: Duration,
    units: Vec<UnitEntry>,
    #[builder(default = "Vec::new()")]
    recommendations: Vec<String>,
}

impl FindingsReport {
    pub fn builder() -> FindingsReportBuilder {
        FindingsReportBuilder::default()
    }

    pub fn from_category(summary: &RunSummary, result: &CategoryResult) -> Result<Self, String> {
        let advice = match result.category {
            Category::Functional => FUNCTIONAL_RECOMMENDATIONS,
            Category::Performance => PERFORMANCE_RECOMMENDATIONS,
            Category::Security => SECURITY_RECOMMENDATIONS,
            Category::Validation => VALIDATION_RECOMMENDATIONS,
        };
        Self::builder()
            .run_id(summary.run_id)
            .timestamp(summary.started_at)
            .category(result.category)
            .status(result.status())
            .counts(result.counts)
            .duration_ms(result.duration)
            .units(result.units.iter().map(UnitEntry::from).collect())
            .recommendations(recommendations(advice))
            .build()
    }
}
