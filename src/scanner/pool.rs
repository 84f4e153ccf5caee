use super::{Check, CheckOutcome, ProbeResult};
use crate::utils::{Result, ScanError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// Counters handed to the progress sink after every completed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Progress sink. Only ever called from the coordinating task, one call at a time.
pub type ProgressFn = Box<dyn FnMut(Progress) + Send>;

pub fn validate_workers(workers: usize) -> Result<()> {
    if workers == 0 {
        return Err(ScanError::Config(
            "worker count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(ScanError::Config("timeout must be positive".to_string()));
    }
    Ok(())
}

/// Runs `check` against every target with at most `workers` invocations in flight.
///
/// Returns one result per input target (duplicates included) in completion
/// order, not input order.
pub async fn run_pool(
    targets: &[String],
    workers: usize,
    timeout: Duration,
    check: Arc<dyn Check>,
    mut on_progress: Option<ProgressFn>,
) -> Result<Vec<ProbeResult>> {
    validate_workers(workers)?;
    validate_timeout(timeout)?;

    let total = targets.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let (job_tx, job_rx) = mpsc::channel::<String>(workers);
    let jobs = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<ProbeResult>();

    let mut tasks = JoinSet::new();

    // Workers beyond the number of targets would never receive work.
    for _ in 0..workers.min(total) {
        let jobs = Arc::clone(&jobs);
        let results = result_tx.clone();
        let check = Arc::clone(&check);
        tasks.spawn(async move {
            loop {
                let next = jobs.lock().await.recv().await;
                let Some(target) = next else { break };
                let outcome = invoke(Arc::clone(&check), target.clone(), timeout).await;
                if results.send(ProbeResult::new(target, outcome)).is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let feed: Vec<String> = targets.to_vec();
    tasks.spawn(async move {
        for target in feed {
            if job_tx.send(target).await.is_err() {
                break;
            }
        }
    });

    let mut out = Vec::with_capacity(total);
    let (mut passed, mut failed) = (0usize, 0usize);
    while let Some(result) = result_rx.recv().await {
        if result.passed {
            passed += 1;
        } else {
            failed += 1;
        }
        out.push(result);
        if let Some(report) = on_progress.as_mut() {
            report(Progress {
                done: out.len(),
                total,
                passed,
                failed,
            });
        }
    }

    while tasks.join_next().await.is_some() {}

    Ok(out)
}

/// Runs one check invocation on its own task so a panicking check fails its
/// target instead of taking the worker down with it.
async fn invoke(check: Arc<dyn Check>, target: String, timeout: Duration) -> CheckOutcome {
    let label = target.clone();
    match tokio::spawn(async move { check.check(&target, timeout).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("check for {} aborted: {}", label, e);
            CheckOutcome::fail()
        }
    }
}
