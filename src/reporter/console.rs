use crate::app::aggregate::RunSummary;
use crate::app::unit::Status;
use crate::reporter::ReportOutcome;
use crate::time::humanize;

/// Human readable digest of the run, mirroring the summary artifact.
pub fn print_summary(summary: &RunSummary, outcome: &ReportOutcome) {
    println!("{}", render(summary, outcome));
}

fn render(summary: &RunSummary, outcome: &ReportOutcome) -> String {
    let mut lines = vec![
        "=".repeat(60),
        format!("TEST EXECUTION SUMMARY ({})", summary.run_id),
        "=".repeat(60),
    ];
    for category in &summary.categories {
        lines.push(format!(
            "{:<12} {:<5} {:>3} passed {:>3} failed {:>3} skipped  {}{}",
            category.category.name(),
            category.status().to_string(),
            category.counts.passed,
            category.counts.failures(),
            category.counts.skipped,
            humanize(&category.duration),
            if category.interrupted { "  (interrupted)" } else { "" }
        ));
        for unit in category.units.iter().filter(|u| u.result.status != Status::Pass) {
            let reason = unit
                .result
                .detail
                .as_ref()
                .map(|d| d.message.as_str())
                .unwrap_or("");
            lines.push(format!("    {} {}: {}", unit.result.status, unit.name, reason));
        }
    }
    lines.push("-".repeat(60));
    lines.push(format!(
        "Total: {}  Passed: {}  Failed: {}  Skipped: {}",
        summary.totals.total,
        summary.totals.passed,
        summary.totals.failures(),
        summary.totals.skipped
    ));
    if let Some(perf) = &summary.performance {
        lines.push(format!(
            "Mean response: {:.2}ms  Throughput: {:.2} units/s",
            perf.mean_response_ms, perf.total_throughput
        ));
    }
    lines.push(format!("Overall status: {}", summary.overall_status()));
    if summary.interrupted {
        lines.push("Run was interrupted before completion".to_owned());
    }
    for path in &outcome.written {
        lines.push(format!("Report: {}", path.display()));
    }
    for (path, e) in &outcome.failures {
        lines.push(format!("Report not written: {} ({})", path.display(), e));
    }
    lines.join("\n")
}
