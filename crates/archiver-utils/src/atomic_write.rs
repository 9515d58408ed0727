//! Atomic file writes: temp file + fsync + rename.
//!
//! Every persisted artifact the pipeline writes (watermarks, failure logs,
//! the lock file) goes through this module so a crash mid-write never
//! leaves a torn file behind.

use camino::Utf8Path;
use std::fs;
use std::io::{self, Write};
use tempfile::NamedTempFile;

/// Write `content` to `path` atomically.
///
/// Creates parent directories if needed, writes to a temp file in the same
/// directory (so the final rename is same-filesystem), fsyncs it, then
/// renames it into place.
pub fn write_file_atomic(path: &Utf8Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut temp_file = NamedTempFile::new_in(temp_dir)?;
    temp_file.write_all(content)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path.as_std_path()).map_err(|e| e.error)?;
    Ok(())
}

/// Convenience wrapper for UTF-8 text content.
pub fn write_file_atomic_str(path: &Utf8Path, content: &str) -> io::Result<()> {
    write_file_atomic(path, content.as_bytes())
}

/// Append `line` (plus a trailing newline) to `path`, creating it if absent.
///
/// This is not atomic in the rename sense — appends are a single `write(2)`
/// call in append mode, which is the durability guarantee the failure log
/// actually needs (readers only ever see whole lines or none of a line).
pub fn append_line(path: &Utf8Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn tmp_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp_path(&dir, "state.json");
        write_file_atomic_str(&path, "{\"a\":1}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp_path(&dir, "nested/deep/state.json");
        write_file_atomic_str(&path, "x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn write_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp_path(&dir, "state.json");
        write_file_atomic_str(&path, "first").unwrap();
        write_file_atomic_str(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn append_line_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp_path(&dir, "failures.log");
        append_line(&path, "42").unwrap();
        append_line(&path, "43").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "42\n43\n");
    }
}
