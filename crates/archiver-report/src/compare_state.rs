//! `--compare-state`: cross-checks a stage's persisted watermark against
//! what its destination data source actually holds.

use std::collections::BTreeSet;

use archiver_state::{parse_failure_log, read_state};
use archiver_utils::StageName;
use camino::Utf8Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDiscrepancy {
    pub stage: StageName,
    pub field: &'static str,
    pub watermark_value: u32,
    pub actual_value: u32,
}

/// The largest `N` such that every run `1..=N` is present in `destination`.
fn actual_contiguous(destination: &BTreeSet<u32>) -> u32 {
    let mut next = 0;
    while destination.contains(&(next + 1)) {
        next += 1;
    }
    next
}

/// The highest run number either present in `destination` or recorded in
/// the failure log — i.e. every run the stage has ever touched.
fn actual_attempted(destination: &BTreeSet<u32>, failed_runs: &[u32]) -> u32 {
    destination.iter().copied().chain(failed_runs.iter().copied()).max().unwrap_or(0)
}

/// Compare one stage's watermark file against its destination source's
/// actual presence set, returning any mismatches found.
pub fn compare_state(
    stage: StageName,
    state_path: &Utf8Path,
    failure_log_path: &Utf8Path,
    destination: &BTreeSet<u32>,
) -> Vec<StateDiscrepancy> {
    let watermark = read_state(state_path);
    let failed_runs = parse_failure_log(failure_log_path);

    let mut discrepancies = Vec::new();

    let actual_contiguous = actual_contiguous(destination);
    if watermark.last_contiguous_run != actual_contiguous {
        discrepancies.push(StateDiscrepancy {
            stage,
            field: "last_contiguous_run",
            watermark_value: watermark.last_contiguous_run,
            actual_value: actual_contiguous,
        });
    }

    let actual_attempted = actual_attempted(destination, &failed_runs);
    if watermark.last_attempted_run != actual_attempted {
        discrepancies.push(StateDiscrepancy {
            stage,
            field: "last_attempted_run",
            watermark_value: watermark.last_attempted_run,
            actual_value: actual_attempted,
        });
    }

    discrepancies
}
