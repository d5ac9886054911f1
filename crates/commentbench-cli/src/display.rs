//! Plain-text rendering of benchmark reports.

use std::fmt::{self, Write};

use commentbench_bench::{BatchReport, DeterminismDetail, ResultsView, RunAllReport};
use commentbench_core::{
    DeterminismSummary, FieldAgreement, LatencyStats, RecordStats, TrackedField,
};

fn rate(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |r| format!("{:.1}%", r * 100.0))
}

fn latency_line(out: &mut String, latency: Option<&LatencyStats>) -> fmt::Result {
    match latency {
        Some(l) => writeln!(
            out,
            "  latency      n={}  mean={:.0}ms  median={:.0}ms  p95={:.0}ms  min={:.0}ms  max={:.0}ms",
            l.count, l.mean_ms, l.median_ms, l.p95_ms, l.min_ms, l.max_ms
        ),
        None => writeln!(out, "  latency      -"),
    }
}

fn distribution(field: &FieldAgreement) -> String {
    field
        .distribution
        .iter()
        .map(|v| format!("{}={}", v.value, v.count))
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Per-record ──

fn record_stats(out: &mut String, stats: &RecordStats) -> fmt::Result {
    writeln!(
        out,
        "  outcomes     {} unique{}",
        stats.unique_outcomes,
        if stats.is_deterministic {
            " (deterministic)"
        } else {
            ""
        }
    )?;
    for field in TrackedField::ALL {
        let agreement = stats.field(field);
        writeln!(
            out,
            "  {:<22} truth={:<5} {}/{} {:>6}  [{}]",
            field.as_str(),
            agreement.truth_value,
            agreement.match_count,
            agreement.total,
            rate(Some(agreement.match_rate)),
            distribution(agreement)
        )?;
    }
    latency_line(out, stats.latency.as_ref())
}

pub fn batch(report: &BatchReport) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "record {}: {}/{} succeeded, {} runs total",
        report.record_id, report.succeeded, report.requested, report.total_runs
    )?;
    for failure in &report.failures {
        writeln!(
            out,
            "  failed #{:<3} {:<9} {}",
            failure.invocation,
            failure.kind.as_str(),
            failure.message
        )?;
    }
    match &report.stats {
        Some(stats) => record_stats(&mut out, stats)?,
        None => writeln!(out, "  no runs yet")?,
    }
    Ok(out)
}

pub fn detail(detail: &DeterminismDetail) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "record {}: showing {} of {} runs",
        detail.record_id,
        detail.runs.len(),
        detail.total_runs
    )?;
    for run in &detail.runs {
        let labels = &run.prediction.labels;
        let outcome = labels
            .outcome()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("/");
        let latency = run
            .latency_ms
            .map_or_else(|| "-".to_string(), |ms| format!("{ms:.0}ms"));
        writeln!(
            out,
            "  #{:<4} {}  {:<24} {:>8}",
            run.attempt,
            run.start_time.format("%Y-%m-%d %H:%M:%S"),
            outcome,
            latency
        )?;
    }
    if let Some(stats) = &detail.stats {
        record_stats(&mut out, stats)?;
    }
    Ok(out)
}

// ── Dataset ──

pub fn determinism_summary(summary: &DeterminismSummary) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "{} rows, {} measured, {} runs, {} deterministic",
        summary.total_rows, summary.rows_with_runs, summary.total_runs, summary.deterministic_rows
    )?;
    writeln!(out, "  {:<22} {:>8} {:>8}", "field", "average", "worst")?;
    for field in TrackedField::ALL {
        let rollup = summary.fields.field(field);
        writeln!(
            out,
            "  {:<22} {:>8} {:>8}",
            field.as_str(),
            rate(rollup.average_match_rate),
            rate(rollup.worst_match_rate)
        )?;
    }
    latency_line(&mut out, summary.latency.as_ref())?;
    Ok(out)
}

pub fn run_all(report: &RunAllReport) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "{}/{} records completed{}, {}/{} invocations succeeded",
        report.rows_completed,
        report.rows_requested,
        if report.cancelled { " (cancelled)" } else { "" },
        report.succeeded,
        report.requested
    )?;
    out.push_str(&determinism_summary(&report.summary)?);
    Ok(out)
}

pub fn results(view: &ResultsView) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for row in &view.rows {
        let predicted = row.prediction.as_ref().map_or_else(
            || "-".to_string(),
            |p| {
                p.labels
                    .outcome()
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join("/")
            },
        );
        let truth = row
            .truth
            .outcome()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("/");
        writeln!(
            out,
            "{:<8} truth={:<24} latest={:<24} runs={}",
            row.id, truth, predicted, row.total_runs
        )?;
    }
    let summary = &view.summary;
    writeln!(
        out,
        "{} scored, {} with at least one mismatch",
        summary.total, summary.failure_count
    )?;
    for metric in &summary.metrics {
        writeln!(
            out,
            "  {:<22} {}/{} {:>6}",
            metric.field,
            metric.correct,
            metric.total,
            rate(Some(metric.accuracy))
        )?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use commentbench_core::{RecordId, summarize};

    #[test]
    fn empty_summary_renders_dashes() {
        let summary = summarize(std::iter::empty());
        let text = determinism_summary(&summary).unwrap();
        assert!(text.starts_with("0 rows, 0 measured, 0 runs"));
        assert!(text.contains("patient_prioritized"));
        assert!(text.contains("latency      -"));
    }

    #[test]
    fn batch_without_runs_says_so() {
        let report = BatchReport {
            record_id: RecordId::new("7"),
            requested: 2,
            succeeded: 0,
            failures: Vec::new(),
            runs: Vec::new(),
            stats: None,
            total_runs: 0,
        };
        let text = batch(&report).unwrap();
        assert!(text.starts_with("record 7: 0/2 succeeded"));
        assert!(text.contains("no runs yet"));
    }

    #[test]
    fn run_all_report_includes_dataset_summary() {
        let report = RunAllReport {
            rows_requested: 3,
            rows_completed: 1,
            cancelled: true,
            requested: 3,
            succeeded: 1,
            summary: summarize(std::iter::empty()),
        };
        let text = run_all(&report).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("1/3 records completed (cancelled), 1/3 invocations succeeded")
        );
        assert_eq!(lines.next(), Some("0 rows, 0 measured, 0 runs, 0 deterministic"));
        assert!(text.ends_with("latency      -\n"));
    }

    #[test]
    fn rate_formats_percentages() {
        assert_eq!(rate(Some(0.8)), "80.0%");
        assert_eq!(rate(None), "-");
    }
}
