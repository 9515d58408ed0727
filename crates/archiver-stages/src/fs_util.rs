//! Filesystem helpers shared by the import and migrate stage bodies.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use archiver_utils::{ArchiverError, StageName};
use camino::Utf8Path;

/// Enumerate immediate subdirectories of `dir` whose names parse as
/// positive run numbers.
pub fn discover_run_directories(dir: &Utf8Path, stage: StageName) -> Result<BTreeSet<u32>, ArchiverError> {
    let read_dir = fs::read_dir(dir).map_err(|e| {
        ArchiverError::Configuration {
            message: format!("reading {dir}: {e}"),
            stage: Some(stage),
            run: None,
            context: BTreeMap::new(),
        }
    })?;

    let mut runs = BTreeSet::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| ArchiverError::Configuration {
            message: format!("reading {dir}: {e}"),
            stage: Some(stage),
            run: None,
            context: BTreeMap::new(),
        })?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            if let Some(run) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) {
                runs.insert(run);
            }
        }
    }
    Ok(runs)
}

/// Copy every regular file directly under `src` into `dst` (already
/// created). Does not recurse into subdirectories.
pub fn copy_dir_flat(src: &Utf8Path, dst: &Utf8Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name().to_string_lossy().as_ref()))?;
        }
    }
    Ok(())
}
