//! Rebuild a stage's watermark and failure log from the two stores it sits
//! between, when the persisted state is believed to have drifted from
//! reality (disk loss, manual intervention, a prior crash mid-write).
//!
//! Import and migrate recovery are the same computation over different
//! pairs of run-number sets: import recovers from (filesystem, config
//! store), migrate recovers from (config store, archive store).

use crate::failure_log::write_failures;
use crate::watermark::{write_state, Watermark};
use camino::Utf8Path;
use std::collections::BTreeSet;

/// Recompute a watermark and failure set from `source` (what should exist)
/// and `destination` (what has landed so far), then persist both.
pub fn recover(
    state_path: &Utf8Path,
    failure_log_path: &Utf8Path,
    source: &BTreeSet<u32>,
    destination: &BTreeSet<u32>,
) -> std::io::Result<Watermark> {
    let last_attempted = destination.iter().max().copied().unwrap_or(0);

    let last_contiguous = match destination.iter().min() {
        Some(&min) => {
            let mut next = min;
            while destination.contains(&(next + 1)) {
                next += 1;
            }
            next
        }
        None => 0,
    };

    let missing: BTreeSet<u32> = source
        .difference(destination)
        .copied()
        .filter(|r| *r <= last_attempted)
        .collect();

    let watermark = Watermark {
        last_contiguous_run: last_contiguous,
        last_attempted_run: last_attempted,
    };
    write_state(state_path, watermark)?;
    write_failures(failure_log_path, &missing)?;
    Ok(watermark)
}
