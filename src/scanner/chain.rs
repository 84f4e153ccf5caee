use super::{
    input_positions, run_pool, sort_by_metric, validate_timeout, validate_workers, Check, IpRecord, Metrics,
    ProgressFn,
};
use crate::utils::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One step of a chain: a check bound to its timeout and ranking metric.
#[derive(Clone)]
pub struct Stage {
    pub name: String,
    pub timeout: Duration,
    pub check: Arc<dyn Check>,
    pub sort_by: Option<String>,
}

impl Stage {
    pub fn new(name: impl Into<String>, timeout: Duration, check: Arc<dyn Check>) -> Self {
        Self {
            name: name.into(),
            timeout,
            check,
            sort_by: None,
        }
    }

    pub fn with_sort_by(mut self, key: impl Into<String>) -> Self {
        self.sort_by = Some(key.into());
        self
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("sort_by", &self.sort_by)
            .finish_non_exhaustive()
    }
}

/// Per-stage statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub tested: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
    pub steps: Vec<StepResult>,
    pub passed: Vec<IpRecord>,
    pub failed: Vec<IpRecord>,
}

impl ChainReport {
    pub fn total_duration_secs(&self) -> f64 {
        self.steps.iter().map(|s| s.duration_secs).sum()
    }
}

/// Builds a fresh progress sink for the named stage.
pub type ProgressFactory<'a> = &'a (dyn Fn(&str) -> Option<ProgressFn> + Sync);

/// Runs every stage in order, each over the survivors of the previous one.
///
/// Passing targets accumulate the metrics of every stage they pass (later
/// stages overwrite same-named keys). With a sort key the survivors enter the
/// next stage in ranked order. Every stage runs even when nothing is left.
pub async fn run_chain(
    targets: &[String],
    workers: usize,
    stages: &[Stage],
    progress: Option<ProgressFactory<'_>>,
) -> Result<ChainReport> {
    validate_workers(workers)?;
    for stage in stages {
        validate_timeout(stage.timeout)?;
    }

    log::info!("chain: {} targets, {} stages", targets.len(), stages.len());

    let input_position = input_positions(targets);

    let mut current: Vec<String> = targets.to_vec();
    let mut accumulated: HashMap<String, Metrics> = HashMap::new();
    let mut ever_failed: HashSet<String> = HashSet::new();
    let mut failed_targets: Vec<String> = Vec::new();
    let mut steps = Vec::with_capacity(stages.len());

    for stage in stages {
        let on_progress = progress.and_then(|factory| factory(&stage.name));

        let started = Instant::now();
        let mut results = run_pool(
            &current,
            workers,
            stage.timeout,
            Arc::clone(&stage.check),
            on_progress,
        )
        .await?;
        let elapsed = started.elapsed();

        let (mut passed, mut failed) = (0usize, 0usize);
        for result in &results {
            if result.passed {
                passed += 1;
                let metrics = accumulated.entry(result.target.clone()).or_default();
                for (key, value) in &result.metrics {
                    metrics.insert(key.clone(), *value);
                }
            } else {
                failed += 1;
                if ever_failed.insert(result.target.clone()) {
                    failed_targets.push(result.target.clone());
                }
            }
        }

        if let Some(key) = &stage.sort_by {
            sort_by_metric(&mut results, key);
        }
        current = results
            .into_iter()
            .filter(|r| r.passed)
            .map(|r| r.target)
            .collect();

        let step = StepResult {
            name: stage.name.clone(),
            tested: passed + failed,
            passed,
            failed,
            duration_secs: elapsed.as_secs_f64(),
        };
        log::info!(
            "{:<18} {} tested | {} pass | {} fail | {:.1}s",
            format!("{}:", step.name),
            step.tested,
            step.passed,
            step.failed,
            step.duration_secs
        );
        steps.push(step);
    }

    // A duplicated target that failed in any copy is reported as failed only.
    let mut seen: HashSet<&str> = HashSet::new();
    let passed: Vec<IpRecord> = current
        .iter()
        .filter(|t| !ever_failed.contains(t.as_str()) && seen.insert(t.as_str()))
        .map(|t| IpRecord::with_metrics(t.clone(), accumulated.remove(t).unwrap_or_default()))
        .collect();

    failed_targets.sort_by_key(|t| input_position.get(t.as_str()).copied());
    let failed: Vec<IpRecord> = failed_targets.into_iter().map(IpRecord::new).collect();

    let report = ChainReport {
        steps,
        passed,
        failed,
    };
    log::info!(
        "chain: {} passed | {} failed | {:.1}s",
        report.passed.len(),
        report.failed.len(),
        report.total_duration_secs()
    );

    Ok(report)
}
