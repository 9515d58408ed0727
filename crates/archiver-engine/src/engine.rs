//! The stage engine template: discover, batch-process under bounded
//! concurrency, retry, advance watermarks, record failures.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use archiver_state::{advance_attempted, advance_contiguous, append_failures, parse_failure_log, write_failures};
use archiver_utils::ArchiverError;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::stage::Stage;

const PROGRESS_REPORT_INTERVAL: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct StageRunConfig {
    pub parallel_workers: usize,
    pub run_process_retries: u32,
    pub retry_delay_seconds: u64,
}

#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    pub successful: BTreeSet<u32>,
    pub failed: BTreeSet<u32>,
    pub cancelled: BTreeSet<u32>,
}

impl StageOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }
}

/// `discover(incremental) -> process_batch -> advance_contiguous`.
pub async fn run_stage(
    stage: Arc<dyn Stage>,
    config: StageRunConfig,
    incremental: bool,
    shutdown: Arc<AtomicBool>,
) -> Result<StageOutcome, ArchiverError> {
    let work = stage.discover(incremental)?;
    if work.is_empty() {
        return Ok(StageOutcome::default());
    }
    let outcome = process_batch(stage.clone(), work, config, shutdown).await?;
    if !outcome.successful.is_empty() {
        advance_contiguous(stage.state_file_path(), &outcome.successful)?;
    }
    Ok(outcome)
}

/// Reprocess the stage's failure log: clear it up front, then let
/// `process_batch`'s own `append_failures` re-record whatever still fails.
pub async fn run_failure_recovery(
    stage: Arc<dyn Stage>,
    config: StageRunConfig,
    shutdown: Arc<AtomicBool>,
) -> Result<StageOutcome, ArchiverError> {
    let failed_runs = parse_failure_log(stage.failure_log_path());
    if failed_runs.is_empty() {
        return Ok(StageOutcome::default());
    }
    write_failures(stage.failure_log_path(), &BTreeSet::new())?;

    let outcome = process_batch(stage.clone(), failed_runs, config, shutdown).await?;
    if !outcome.successful.is_empty() {
        advance_contiguous(stage.state_file_path(), &outcome.successful)?;
    }
    Ok(outcome)
}

async fn process_batch(
    stage: Arc<dyn Stage>,
    runs: Vec<u32>,
    config: StageRunConfig,
    shutdown: Arc<AtomicBool>,
) -> Result<StageOutcome, ArchiverError> {
    let total = runs.len();
    let effective_workers = match stage.max_concurrency() {
        Some(cap) => cap.min(config.parallel_workers).max(1),
        None => config.parallel_workers.max(1),
    };
    let semaphore = Arc::new(Semaphore::new(effective_workers));

    let mut pending: VecDeque<u32> = runs.into_iter().collect();
    let mut in_flight: JoinSet<(u32, Result<(), ArchiverError>)> = JoinSet::new();
    let mut successful = BTreeSet::new();
    let mut failed = BTreeSet::new();
    let mut cancelled = BTreeSet::new();
    let mut completions = 0usize;

    loop {
        while in_flight.len() < effective_workers {
            let Some(run) = pending.pop_front() else { break };
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore is never closed");
            let stage = stage.clone();
            let retries = config.run_process_retries;
            let delay = Duration::from_secs(config.retry_delay_seconds);
            in_flight.spawn_blocking(move || {
                let _permit = permit;
                let result = process_with_retries(stage.as_ref(), run, retries, delay);
                (run, result)
            });
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };
        let (run, result) = joined.expect("process_one task panicked");
        completions += 1;
        match result {
            Ok(()) => {
                successful.insert(run);
            }
            Err(e) => {
                tracing::warn!(stage = stage.name(), run, error = %e, "run failed after retries");
                failed.insert(run);
            }
        }
        if completions % PROGRESS_REPORT_INTERVAL == 0 {
            tracing::info!(stage = stage.name(), completions, total, "progress");
        }

        if shutdown.load(Ordering::SeqCst) {
            cancelled.extend(pending.drain(..));
            break;
        }
    }

    // Drain whatever was already in flight when the shutdown check fired,
    // or whatever's left once `pending` has been fully submitted.
    while let Some(joined) = in_flight.join_next().await {
        let (run, result) = joined.expect("process_one task panicked");
        completions += 1;
        match result {
            Ok(()) => {
                successful.insert(run);
            }
            Err(e) => {
                tracing::warn!(stage = stage.name(), run, error = %e, "run failed after retries");
                failed.insert(run);
            }
        }
    }

    let attempted: BTreeSet<u32> = successful.iter().chain(failed.iter()).copied().collect();
    if !attempted.is_empty() {
        advance_attempted(stage.state_file_path(), &attempted)?;
    }
    if !failed.is_empty() {
        append_failures(stage.failure_log_path(), &failed)?;
    }

    Ok(StageOutcome { successful, failed, cancelled })
}

fn process_with_retries(stage: &dyn Stage, run: u32, retries: u32, delay: Duration) -> Result<(), ArchiverError> {
    let mut last_err = None;
    for attempt in 0..=retries {
        match stage.process_one(run) {
            Ok(()) => return Ok(()),
            Err(err @ ArchiverError::PermanentSkip { .. }) => return Err(err),
            Err(err) => {
                last_err = Some(err);
                if attempt < retries {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}
