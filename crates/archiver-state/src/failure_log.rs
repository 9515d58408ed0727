//! Failure log: one run number per line, for the explicit retry modes.

use camino::Utf8Path;
use std::collections::BTreeSet;

/// Append each run in `runs` as its own line, creating the file if absent.
pub fn append_failures(path: &Utf8Path, runs: &BTreeSet<u32>) -> std::io::Result<()> {
    for run in runs {
        archiver_utils::atomic_write::append_line(path, &run.to_string())?;
    }
    Ok(())
}

/// Overwrite the file with `runs` in ascending order, one per line.
pub fn write_failures(path: &Utf8Path, runs: &BTreeSet<u32>) -> std::io::Result<()> {
    let body = runs
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    let body = if body.is_empty() { body } else { format!("{body}\n") };
    archiver_utils::atomic_write::write_file_atomic_str(path, &body)
}

/// Parse one integer per line, silently skipping blank or non-integer lines.
/// Returns an empty list if the file does not exist.
pub fn parse_failure_log(path: &Utf8Path) -> Vec<u32> {
    let Ok(contents) = std::fs::read_to_string(path.as_std_path()) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn log_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("failures.log")).unwrap()
    }

    #[test]
    fn append_then_parse_yields_superset_of_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_path(&dir);
        let first: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        append_failures(&path, &first).unwrap();
        let second: BTreeSet<u32> = [4].into_iter().collect();
        append_failures(&path, &second).unwrap();

        let parsed: BTreeSet<u32> = parse_failure_log(&path).into_iter().collect();
        assert!(first.is_subset(&parsed));
        assert!(second.is_subset(&parsed));
    }

    #[test]
    fn parse_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_path(&dir);
        assert!(parse_failure_log(&path).is_empty());
    }

    #[test]
    fn parse_skips_blank_and_non_integer_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_path(&dir);
        std::fs::write(&path, "1\n\nnot-a-number\n2\n   \n3\n").unwrap();
        assert_eq!(parse_failure_log(&path), vec![1, 2, 3]);
    }

    #[test]
    fn write_failures_overwrites_in_ascending_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_path(&dir);
        append_failures(&path, &[9, 1, 1, 5].into_iter().collect()).unwrap();
        let runs: BTreeSet<u32> = [3, 1, 2].into_iter().collect();
        write_failures(&path, &runs).unwrap();
        assert_eq!(parse_failure_log(&path), vec![1, 2, 3]);
    }

    #[test]
    fn write_failures_empty_set_produces_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = log_path(&dir);
        write_failures(&path, &BTreeSet::new()).unwrap();
        assert!(parse_failure_log(&path).is_empty());
    }

    #[test]
    fn recovery_import_scenario_failure_log() {
        // Filesystem {100..110}, configuration store {100,101,102,103,105,106,107,108}.
        // Only 104 is a failure: it's within the attempted range (<=108) but missing.
        let dir = tempfile::tempdir().unwrap();
        let path = log_path(&dir);
        let runs: BTreeSet<u32> = [104].into_iter().collect();
        write_failures(&path, &runs).unwrap();
        assert_eq!(parse_failure_log(&path), vec![104]);
    }
}
