use dnst_scanner::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Passes the targets listed in `table` with a fixed `metric` value.
fn table_check(metric: &'static str, table: &[(&str, f64)]) -> Arc<dyn Check> {
    let table: Arc<HashMap<String, f64>> = Arc::new(
        table
            .iter()
            .map(|(target, value)| (target.to_string(), *value))
            .collect(),
    );
    Arc::new(check_fn(move |target: String, _timeout: Duration| {
        let table = Arc::clone(&table);
        async move {
            match table.get(&target) {
                Some(value) => CheckOutcome::pass_with(metric, *value),
                None => CheckOutcome::fail(),
            }
        }
    }))
}

fn targets(ips: &[&str]) -> Vec<String> {
    ips.iter().map(|ip| ip.to_string()).collect()
}

fn ips(records: &[IpRecord]) -> Vec<&str> {
    records.iter().map(|r| r.ip.as_str()).collect()
}

#[tokio::test]
async fn test_two_stage_chain_accumulates_metrics() {
    let stages = vec![
        Stage::new(
            "ping",
            Duration::from_secs(1),
            table_check("ping_ms", &[("1.1.1.1", 12.0), ("8.8.8.8", 4.0)]),
        )
        .with_sort_by("ping_ms"),
        Stage::new(
            "resolve",
            Duration::from_secs(1),
            table_check("resolve_ms", &[("1.1.1.1", 20.0), ("8.8.8.8", 30.0)]),
        )
        .with_sort_by("resolve_ms"),
    ];

    let report = run_chain(&targets(&["1.1.1.1", "8.8.8.8", "9.9.9.9"]), 4, &stages, None)
        .await
        .unwrap();

    assert_eq!(ips(&report.passed), vec!["1.1.1.1", "8.8.8.8"]);
    assert_eq!(ips(&report.failed), vec!["9.9.9.9"]);

    let first = &report.passed[0];
    assert_eq!(first.metrics["ping_ms"], 12.0);
    assert_eq!(first.metrics["resolve_ms"], 20.0);

    assert_eq!(report.steps.len(), 2);
    assert_eq!((report.steps[0].tested, report.steps[0].passed), (3, 2));
    assert_eq!((report.steps[1].tested, report.steps[1].failed), (2, 0));
}

#[tokio::test]
async fn test_chain_drops_targets_failing_later_stages() {
    let stages = vec![
        Stage::new(
            "first",
            Duration::from_secs(1),
            table_check("a_ms", &[("10.0.0.1", 1.0), ("10.0.0.2", 2.0)]),
        ),
        Stage::new(
            "second",
            Duration::from_secs(1),
            table_check("b_ms", &[("10.0.0.2", 5.0)]),
        ),
    ];

    let report = run_chain(&targets(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]), 1, &stages, None)
        .await
        .unwrap();

    assert_eq!(ips(&report.passed), vec!["10.0.0.2"]);
    assert_eq!(ips(&report.failed), vec!["10.0.0.1", "10.0.0.3"]);
    assert_eq!(report.passed.len() + report.failed.len(), 3);
}

#[tokio::test]
async fn test_chain_report_feeds_next_run() {
    let stages = vec![Stage::new(
        "ping",
        Duration::from_secs(1),
        table_check("ping_ms", &[("1.0.0.1", 3.0)]),
    )];
    let report = run_chain(&targets(&["1.0.0.1", "9.9.9.9"]), 2, &stages, None)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.json");
    write_chain_report(&report, &path).unwrap();

    assert_eq!(load_input(&path, false).unwrap(), vec!["1.0.0.1"]);
    assert_eq!(load_input(&path, true).unwrap(), vec!["1.0.0.1", "9.9.9.9"]);
}

#[tokio::test]
async fn test_direct_run_report_is_ranked() {
    let check = table_check(
        "ping_ms",
        &[("1.1.1.1", 30.0), ("8.8.8.8", 10.0), ("8.8.4.4", 20.0)],
    );
    let input = targets(&["1.1.1.1", "8.8.8.8", "9.9.9.9", "8.8.4.4"]);

    let results = run_pool(&input, 3, Duration::from_secs(1), check, None)
        .await
        .unwrap();
    assert_eq!(results.len(), 4);

    let report = Report::from_results(&input, &results, Some("ping_ms"));
    assert_eq!(ips(&report.passed), vec!["8.8.8.8", "8.8.4.4", "1.1.1.1"]);
    assert_eq!(ips(&report.failed), vec!["9.9.9.9"]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ping.json");
    write_report(&report, &path).unwrap();
    let reloaded: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(reloaded, report);
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_before_running() {
    let stages = vec![Stage::new(
        "ping",
        Duration::ZERO,
        table_check("ping_ms", &[]),
    )];
    let err = run_chain(&targets(&["1.1.1.1"]), 4, &stages, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Config(_)));
}
