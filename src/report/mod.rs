//! JSON reports and the human summary lines printed after a run.

use crate::scanner::{input_positions, sort_by_metric, ChainReport, IpRecord, ProbeResult, StepResult};
use crate::utils::Result;
use colored::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Outcome of one direct-mode run. Also accepted as input for the next run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub passed: Vec<IpRecord>,
    #[serde(default)]
    pub failed: Vec<IpRecord>,
}

impl Report {
    /// Splits the results of a run over `targets` into passed and failed.
    /// Passed entries are ranked by `sort_by` when given; failed entries
    /// follow input order and drop their metrics.
    pub fn from_results(
        targets: &[String],
        results: &[ProbeResult],
        sort_by: Option<&str>,
    ) -> Self {
        let (mut passed, mut failed): (Vec<ProbeResult>, Vec<ProbeResult>) =
            results.iter().cloned().partition(|r| r.passed);

        if let Some(key) = sort_by {
            sort_by_metric(&mut passed, key);
        }
        let positions = input_positions(targets);
        failed.sort_by_key(|r| positions.get(r.target.as_str()).copied());

        Self {
            passed: passed
                .into_iter()
                .map(|r| IpRecord::with_metrics(r.target, r.metrics))
                .collect(),
            failed: failed.into_iter().map(|r| IpRecord::new(r.target)).collect(),
        }
    }
}

pub fn write_report(report: &Report, path: impl AsRef<Path>) -> Result<()> {
    write_json(report, path.as_ref())
}

pub fn write_chain_report(report: &ChainReport, path: impl AsRef<Path>) -> Result<()> {
    write_json(report, path.as_ref())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');
    std::fs::write(path, data)?;
    log::info!("report written to {}", path.display());
    Ok(())
}

pub fn print_stats(mode: &str, results: &[ProbeResult], elapsed: Duration) {
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;
    println!(
        "{}: {} tested | {} pass | {} fail | {}",
        mode.bold(),
        results.len(),
        passed.to_string().green().bold(),
        failed.to_string().red().bold(),
        format!("{:.1}s", elapsed.as_secs_f64()).cyan()
    );
}

pub fn print_step(step: &StepResult) {
    println!(
        "{:<18} {} tested | {} pass | {} fail | {}",
        format!("{}:", step.name).bold(),
        step.tested,
        step.passed.to_string().green().bold(),
        step.failed.to_string().red().bold(),
        format!("{:.1}s", step.duration_secs).cyan()
    );
}

pub fn print_chain_summary(report: &ChainReport) {
    for step in &report.steps {
        print_step(step);
    }
    println!("{}", "-".repeat(60).blue());
    println!(
        "{}: {} passed | {} failed | {}",
        "chain".bold(),
        report.passed.len().to_string().green().bold(),
        report.failed.len().to_string().red().bold(),
        format!("{:.1}s", report.total_duration_secs()).cyan()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{CheckOutcome, Metrics};

    fn passed(target: &str, key: &str, value: f64) -> ProbeResult {
        ProbeResult::new(target.to_string(), CheckOutcome::pass_with(key, value))
    }

    fn failed(target: &str) -> ProbeResult {
        ProbeResult::new(target.to_string(), CheckOutcome::fail())
    }

    fn targets(results: &[ProbeResult]) -> Vec<String> {
        results.iter().map(|r| r.target.clone()).collect()
    }

    #[test]
    fn test_from_results_sorts_passed() {
        let results = vec![
            passed("1.1.1.1", "ping_ms", 30.0),
            failed("9.9.9.9"),
            passed("8.8.8.8", "ping_ms", 10.0),
            ProbeResult::new("4.4.4.4".to_string(), CheckOutcome::pass(Metrics::new())),
        ];
        let report = Report::from_results(&targets(&results), &results, Some("ping_ms"));

        let ips: Vec<&str> = report.passed.iter().map(|r| r.ip.as_str()).collect();
        assert_eq!(ips, vec!["8.8.8.8", "1.1.1.1", "4.4.4.4"]);
        assert_eq!(report.failed, vec![IpRecord::new("9.9.9.9")]);
    }

    #[test]
    fn test_from_results_without_sort_keeps_order() {
        let results = vec![passed("1.1.1.1", "x", 3.0), passed("8.8.8.8", "x", 1.0)];
        let report = Report::from_results(&targets(&results), &results, None);
        assert_eq!(report.passed[0].ip, "1.1.1.1");
    }

    #[test]
    fn test_failed_follow_input_order() {
        let input: Vec<String> = ["9.9.9.9", "1.1.1.1", "4.4.4.4", "8.8.8.8"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        // Completion order differs from input order.
        let results = vec![
            failed("8.8.8.8"),
            passed("1.1.1.1", "ping_ms", 3.0),
            failed("4.4.4.4"),
            failed("9.9.9.9"),
        ];
        let report = Report::from_results(&input, &results, Some("ping_ms"));

        let failed: Vec<&str> = report.failed.iter().map(|r| r.ip.as_str()).collect();
        assert_eq!(failed, vec!["9.9.9.9", "4.4.4.4", "8.8.8.8"]);
    }

    #[test]
    fn test_failed_metrics_dropped() {
        let mut outcome = CheckOutcome::pass_with("ping_ms", 1.0);
        outcome.passed = false;
        let results = vec![ProbeResult::new("1.1.1.1".into(), outcome)];
        let report = Report::from_results(&targets(&results), &results, None);
        assert!(report.failed[0].metrics.is_empty());
    }

    #[test]
    fn test_empty_report_serializes_arrays() {
        let json = serde_json::to_value(Report::default()).unwrap();
        assert_eq!(json, serde_json::json!({"passed": [], "failed": []}));
    }

    #[test]
    fn test_metrics_omitted_when_empty() {
        let report = Report {
            passed: vec![IpRecord::with_metrics(
                "1.1.1.1",
                Metrics::from([("ping_ms".to_string(), 4.5)]),
            )],
            failed: vec![IpRecord::new("9.9.9.9")],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "passed": [{"ip": "1.1.1.1", "metrics": {"ping_ms": 4.5}}],
                "failed": [{"ip": "9.9.9.9"}]
            })
        );
    }

    #[test]
    fn test_write_chain_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        let report = ChainReport {
            steps: vec![StepResult {
                name: "ping".to_string(),
                tested: 2,
                passed: 1,
                failed: 1,
                duration_secs: 0.5,
            }],
            passed: vec![IpRecord::new("1.1.1.1")],
            failed: vec![IpRecord::new("9.9.9.9")],
        };
        write_chain_report(&report, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["steps"][0]["name"], "ping");
        assert_eq!(written["steps"][0]["duration_secs"], 0.5);
        assert_eq!(written["passed"][0]["ip"], "1.1.1.1");
    }

    #[test]
    fn test_write_report_to_missing_dir() {
        let err = write_report(&Report::default(), "/nonexistent/dir/out.json").unwrap_err();
        assert!(matches!(err, crate::utils::ScanError::Io(_)));
    }
}
