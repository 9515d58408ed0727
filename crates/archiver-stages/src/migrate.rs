//! Migrate stage: configuration store records out, archive store blobs
//! in.

use std::collections::BTreeSet;
use std::sync::Arc;

use archiver_blob::{pack, validate as validate_blob, ValidatorSpec};
use archiver_engine::Stage;
use archiver_state::incremental_start;
use archiver_stores::{ArchiveStore, ConfigStore};
use archiver_utils::paths::ScopedDir;
use archiver_utils::{ArchiverError, StageName};
use camino::{Utf8Path, Utf8PathBuf};

pub struct MigrateStage {
    pub config_store: Arc<dyn ConfigStore>,
    pub archive_store: Arc<dyn ArchiveStore>,
    pub validator_spec: Option<ValidatorSpec>,
    pub validate_md5: bool,
    pub work_dir: Utf8PathBuf,
    pub state_path: Utf8PathBuf,
    pub failure_log_path: Utf8PathBuf,
    pub permanent_skip_runs: BTreeSet<u32>,
}

/// Strips a leading `"<run_number>/"` prefix some transports leave in the
/// resolved config name.
fn strip_run_prefix(run: u32, config_name: &str) -> String {
    config_name.strip_prefix(&format!("{run}/")).unwrap_or(config_name).to_string()
}

impl Stage for MigrateStage {
    fn name(&self) -> &str {
        "migrate"
    }

    fn state_file_path(&self) -> &Utf8Path {
        &self.state_path
    }

    fn failure_log_path(&self) -> &Utf8Path {
        &self.failure_log_path
    }

    fn max_concurrency(&self) -> Option<usize> {
        self.config_store.max_concurrency()
    }

    fn discover(&self, incremental: bool) -> Result<Vec<u32>, ArchiverError> {
        let archived = self.config_store.list_runs()?;
        let uploaded = self.archive_store.list_runs()?;
        let mut new: BTreeSet<u32> = archived.difference(&uploaded).copied().collect();
        if incremental {
            let start = incremental_start(&self.state_path);
            new.retain(|run| *run > start);
        }
        Ok(new.into_iter().collect())
    }

    fn process_one(&self, run: u32) -> Result<(), ArchiverError> {
        if self.permanent_skip_runs.contains(&run) {
            return Err(ArchiverError::PermanentSkip {
                message: format!("run {run} is in the permanent-skip set"),
                stage: Some(StageName::Migrate),
                run: Some(run),
                context: Default::default(),
            });
        }

        // Resolution failure (not-found) must fail the run before export is
        // attempted, even though the export call itself only needs the run
        // number.
        self.config_store
            .resolve_config_name(run)
            .map(|name| strip_run_prefix(run, &name))
            .map_err(|e| e.with_stage(StageName::Migrate).with_run(run))?;

        let export_dir = ScopedDir::create(&self.work_dir, &format!("migrate-{run}-export-")).map_err(io_error)?;
        self.config_store
            .export(run, export_dir.path())
            .map_err(|e| e.with_stage(StageName::Migrate).with_run(run))?;

        let blob = pack(run, export_dir.path())?;

        if let Some(spec) = &self.validator_spec {
            let result = validate_blob(&blob, spec);
            if result.error_count > 0 {
                return Err(ArchiverError::Verification {
                    message: format!("blob validation found {} error(s)", result.error_count),
                    stage: Some(StageName::Migrate),
                    run: Some(run),
                    context: Default::default(),
                });
            }
        }

        self.archive_store.upload(run, &blob).map_err(|e| e.with_stage(StageName::Migrate).with_run(run))?;

        if self.validate_md5 {
            let downloaded = self.archive_store.download(run).map_err(|e| e.with_stage(StageName::Migrate).with_run(run))?;
            let uploaded_digest = format!("{:x}", md5::compute(blob.as_bytes()));
            let downloaded_digest = format!("{:x}", md5::compute(downloaded.as_bytes()));
            if uploaded_digest != downloaded_digest {
                return Err(ArchiverError::Verification {
                    message: format!("MD5 round-trip mismatch for run {run}: {uploaded_digest} != {downloaded_digest}"),
                    stage: Some(StageName::Migrate),
                    run: Some(run),
                    context: Default::default(),
                });
            }
        }

        Ok(())
    }
}

fn io_error(e: std::io::Error) -> ArchiverError {
    ArchiverError::Configuration { message: e.to_string(), stage: Some(StageName::Migrate), run: None, context: Default::default() }
}
