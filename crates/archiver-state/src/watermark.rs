//! Per-stage watermark file: `{"last_contiguous_run": N, "last_attempted_run": M}`.
//!
//! Both numbers are monotonic ratchets. `last_contiguous_run` only ever
//! advances through an unbroken run of successes starting just past its
//! current value; `last_attempted_run` tracks the highest run number any
//! attempt (success or failure) has touched, and is always >= the
//! contiguous mark.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Watermark {
    pub last_contiguous_run: u32,
    pub last_attempted_run: u32,
}

/// Read the watermark at `path`. A missing or malformed file reads as the
/// zero watermark rather than an error — the stage engine treats "no state
/// yet" and "corrupt state" the same way: start from the beginning.
pub fn read_state(path: &Utf8Path) -> Watermark {
    match std::fs::read_to_string(path.as_std_path()) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path, error = %err, "malformed watermark file, treating as empty");
            Watermark::default()
        }),
        Err(_) => Watermark::default(),
    }
}

pub fn write_state(path: &Utf8Path, state: Watermark) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(&state)
        .expect("Watermark serialization is infallible");
    archiver_utils::atomic_write::write_file_atomic_str(path, &json)
}

/// Extend `last_contiguous_run` as far as an unbroken run of successes
/// allows, starting one past the current value. Stops at the first gap.
pub fn advance_contiguous(path: &Utf8Path, successful_runs: &BTreeSet<u32>) -> std::io::Result<Watermark> {
    let mut state = read_state(path);
    let mut next = state.last_contiguous_run;
    while successful_runs.contains(&(next + 1)) {
        next += 1;
    }
    state.last_contiguous_run = next;
    write_state(path, state)?;
    Ok(state)
}

/// Raise `last_attempted_run` to the highest run number in `attempted_runs`,
/// if that exceeds the current value. A no-op on an empty set.
pub fn advance_attempted(path: &Utf8Path, attempted_runs: &BTreeSet<u32>) -> std::io::Result<Watermark> {
    let Some(&max_attempted) = attempted_runs.iter().max() else {
        return Ok(read_state(path));
    };
    let mut state = read_state(path);
    state.last_attempted_run = state.last_attempted_run.max(max_attempted);
    write_state(path, state)?;
    Ok(state)
}

/// The run number below which incremental discovery should not propose work.
pub fn incremental_start(path: &Utf8Path) -> u32 {
    let state = read_state(path);
    state.last_contiguous_run.max(state.last_attempted_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn state_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("state.json")).unwrap()
    }

    #[test]
    fn read_state_missing_file_is_zero_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        assert_eq!(read_state(&path), Watermark::default());
    }

    #[test]
    fn read_state_malformed_file_is_zero_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(read_state(&path), Watermark::default());
    }

    #[test]
    fn contiguous_advance_with_gap_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        write_state(
            &path,
            Watermark {
                last_contiguous_run: 100,
                last_attempted_run: 100,
            },
        )
        .unwrap();

        let successes: BTreeSet<u32> = [101, 102, 104].into_iter().collect();
        let state = advance_contiguous(&path, &successes).unwrap();
        assert_eq!(state.last_contiguous_run, 102);

        advance_attempted(&path, &successes).unwrap();
        let bridged: BTreeSet<u32> = [103].into_iter().collect();
        let state = advance_contiguous(&path, &bridged).unwrap();
        assert_eq!(state.last_contiguous_run, 104);
    }

    #[test]
    fn attempted_monotonicity_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        write_state(
            &path,
            Watermark {
                last_contiguous_run: 0,
                last_attempted_run: 105,
            },
        )
        .unwrap();

        let lower: BTreeSet<u32> = [98, 99, 100].into_iter().collect();
        let state = advance_attempted(&path, &lower).unwrap();
        assert_eq!(state.last_attempted_run, 105);
    }

    #[test]
    fn advance_attempted_is_noop_on_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        write_state(
            &path,
            Watermark {
                last_contiguous_run: 5,
                last_attempted_run: 5,
            },
        )
        .unwrap();
        let state = advance_attempted(&path, &BTreeSet::new()).unwrap();
        assert_eq!(state.last_attempted_run, 5);
    }

    #[test]
    fn incremental_start_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        write_state(
            &path,
            Watermark {
                last_contiguous_run: 102,
                last_attempted_run: 110,
            },
        )
        .unwrap();
        assert_eq!(incremental_start(&path), 110);
    }

    #[test]
    fn incremental_start_missing_file_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        assert_eq!(incremental_start(&path), 0);
    }

    #[test]
    fn contiguous_never_decreases_when_successes_are_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_path(&dir);
        write_state(
            &path,
            Watermark {
                last_contiguous_run: 50,
                last_attempted_run: 50,
            },
        )
        .unwrap();
        let stale: BTreeSet<u32> = [10, 11, 12].into_iter().collect();
        let state = advance_contiguous(&path, &stale).unwrap();
        assert_eq!(state.last_contiguous_run, 50);
    }
}
