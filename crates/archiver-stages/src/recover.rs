//! Wires the generic watermark/failure-log rebuild in `archiver-state` to
//! each stage's own source and destination sets.

use std::sync::Arc;

use archiver_state::{recover, Watermark};
use archiver_stores::{ArchiveStore, ConfigStore};
use archiver_utils::ArchiverError;
use camino::Utf8Path;

use crate::fs_util::discover_run_directories;
use archiver_utils::StageName;

pub fn recover_import_state(
    state_path: &Utf8Path,
    failure_log_path: &Utf8Path,
    run_records_dir: &Utf8Path,
    config_store: &Arc<dyn ConfigStore>,
) -> Result<Watermark, ArchiverError> {
    let source = discover_run_directories(run_records_dir, StageName::Import)?;
    let destination = config_store.list_runs()?;
    recover(state_path, failure_log_path, &source, &destination)
        .map_err(|e| ArchiverError::configuration(e.to_string()).with_stage(StageName::Import))
}

pub fn recover_migrate_state(
    state_path: &Utf8Path,
    failure_log_path: &Utf8Path,
    config_store: &Arc<dyn ConfigStore>,
    archive_store: &Arc<dyn ArchiveStore>,
) -> Result<Watermark, ArchiverError> {
    let source = config_store.list_runs()?;
    let destination = archive_store.list_runs()?;
    recover(state_path, failure_log_path, &source, &destination)
        .map_err(|e| ArchiverError::configuration(e.to_string()).with_stage(StageName::Migrate))
}
