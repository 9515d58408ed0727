//! Small path helpers shared by the state, lock, and stage crates.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;

/// Create `dir` (and its parents) if it does not already exist.
pub fn ensure_dir(dir: &Utf8Path) -> io::Result<()> {
    std::fs::create_dir_all(dir.as_std_path())
}

/// Create a fresh, uniquely-named scratch directory under `parent`, for a
/// single run's staging files. Callers are responsible for removing it on
/// every exit path, success or failure.
pub fn scoped_temp_dir(parent: &Utf8Path, prefix: &str) -> io::Result<Utf8PathBuf> {
    ensure_dir(parent)?;
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(parent.as_std_path())?
        .keep();
    Utf8PathBuf::from_path_buf(dir)
        .map_err(|p| io::Error::new(io::ErrorKind::InvalidData, format!("non-utf8 path: {p:?}")))
}

/// Best-effort recursive removal; logs and swallows errors rather than
/// propagating them, since scratch-dir cleanup must never fail a run that
/// otherwise succeeded.
pub fn remove_dir_best_effort(dir: &Utf8Path) {
    if let Err(err) = std::fs::remove_dir_all(dir.as_std_path()) {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %dir, error = %err, "failed to remove scratch directory");
        }
    }
}

/// Owns a scratch directory created by [`scoped_temp_dir`] and removes it
/// on drop, success or failure, so a stage's `process_one` doesn't need an
/// explicit cleanup call on every return path.
pub struct ScopedDir {
    path: Utf8PathBuf,
}

impl ScopedDir {
    pub fn create(parent: &Utf8Path, prefix: &str) -> io::Result<Self> {
        Ok(Self { path: scoped_temp_dir(parent, prefix)? })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        remove_dir_best_effort(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_dir_removes_itself_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let base = Utf8Path::from_path(base.path()).unwrap();
        let path = {
            let scoped = ScopedDir::create(base, "run-").unwrap();
            let path = scoped.path().to_owned();
            assert!(path.exists());
            path
        };
        assert!(!path.exists());
    }

    #[test]
    fn scoped_temp_dir_is_created_and_unique() {
        let base = tempfile::tempdir().unwrap();
        let base = Utf8Path::from_path(base.path()).unwrap();
        let a = scoped_temp_dir(base, "run-").unwrap();
        let b = scoped_temp_dir(base, "run-").unwrap();
        assert!(a.exists());
        assert!(b.exists());
        assert_ne!(a, b);
    }

    #[test]
    fn remove_dir_best_effort_ignores_missing_dir() {
        let base = tempfile::tempdir().unwrap();
        let missing = Utf8Path::from_path(base.path()).unwrap().join("nope");
        remove_dir_best_effort(&missing);
    }
}
