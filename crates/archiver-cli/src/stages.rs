//! Builds the two stages from a loaded configuration document and the
//! already-constructed store adapters.

use std::collections::BTreeSet;
use std::sync::Arc;

use archiver_config::Config;
use archiver_stages::{ImportStage, MigrateStage};
use archiver_stores::{ArchiveStore, ConfigStore};

pub fn build_import_stage(config: &Config, config_store: Arc<dyn ConfigStore>) -> ImportStage {
    ImportStage {
        run_records_dir: config.source_files.run_records_dir.clone(),
        config_store,
        converters: config.fhiclize_generate.converters.clone(),
        generate_run_history: config.fhiclize_generate.generate_run_history,
        generate_run_history2: config.fhiclize_generate.generate_run_history2,
        schema_dir: config.configuration_store.schema_dir.clone(),
        work_dir: config.app.work_dir.clone(),
        state_path: config.app.work_dir.join("importer_state.json"),
        failure_log_path: config.app.work_dir.join("import_failures.log"),
        permanent_skip_runs: config.fuzz.permanent_skip_runs.iter().copied().collect::<BTreeSet<u32>>(),
    }
}

pub fn build_migrate_stage(
    config: &Config,
    config_store: Arc<dyn ConfigStore>,
    archive_store: Arc<dyn ArchiveStore>,
    validate_md5: bool,
) -> MigrateStage {
    MigrateStage {
        config_store,
        archive_store,
        validator_spec: None,
        validate_md5,
        work_dir: config.app.work_dir.clone(),
        state_path: config.app.work_dir.join("migrator_state.json"),
        failure_log_path: config.app.work_dir.join("migrate_failures.log"),
        permanent_skip_runs: config.fuzz.permanent_skip_runs.iter().copied().collect::<BTreeSet<u32>>(),
    }
}
