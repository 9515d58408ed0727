//! Import stage: source filesystem run records in, configuration store
//! records out.

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use archiver_config::ConverterKind;
use archiver_convert::{converter_for, extract_config_name, extract_run_times, generate_run_history, output_filename, source_filename};
use archiver_engine::Stage;
use archiver_state::incremental_start;
use archiver_stores::ConfigStore;
use archiver_utils::paths::ScopedDir;
use archiver_utils::{ArchiverError, StageName};
use camino::{Utf8Path, Utf8PathBuf};

use crate::fs_util::{copy_dir_flat, discover_run_directories};

pub struct ImportStage {
    pub run_records_dir: Utf8PathBuf,
    pub config_store: Arc<dyn ConfigStore>,
    pub converters: Vec<ConverterKind>,
    pub generate_run_history: bool,
    pub generate_run_history2: bool,
    pub schema_dir: Utf8PathBuf,
    pub work_dir: Utf8PathBuf,
    pub state_path: Utf8PathBuf,
    pub failure_log_path: Utf8PathBuf,
    pub permanent_skip_runs: BTreeSet<u32>,
}

impl ImportStage {
    fn config_name_from(&self, metadata_text: Option<&str>) -> String {
        metadata_text.map(extract_config_name).unwrap_or_else(|| "standard".to_string())
    }

    fn copy_schema(&self, dir: &Utf8Path) -> Result<(), ArchiverError> {
        fs::copy(self.schema_dir.join("schema.fcl"), dir.join("schema.fcl"))
            .map(|_| ())
            .map_err(|e| io_error(e, StageName::Import))
    }
}

fn io_error(e: std::io::Error, stage: StageName) -> ArchiverError {
    ArchiverError::Configuration { message: e.to_string(), stage: Some(stage), run: None, context: Default::default() }
}

impl Stage for ImportStage {
    fn name(&self) -> &str {
        "import"
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
        let filesystem_runs = discover_run_directories(&self.run_records_dir, StageName::Import)?;
        let archived_runs = self.config_store.list_runs()?;
        let mut new: BTreeSet<u32> = filesystem_runs.difference(&archived_runs).copied().collect();
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
                stage: Some(StageName::Import),
                run: Some(run),
                context: Default::default(),
            });
        }

        let source_dir = self.run_records_dir.join(run.to_string());
        let raw_metadata = fs::read_to_string(source_dir.join(source_filename(ConverterKind::Metadata))).ok();
        let config_name = self.config_name_from(raw_metadata.as_deref());

        let initial = ScopedDir::create(&self.work_dir, &format!("import-{run}-initial-")).map_err(|e| io_error(e, StageName::Import))?;
        copy_dir_flat(&source_dir, initial.path()).map_err(|e| io_error(e, StageName::Import))?;

        for kind in &self.converters {
            let source_path = source_dir.join(source_filename(*kind));
            let Ok(text) = fs::read_to_string(&source_path) else { continue };
            let converted = converter_for(*kind)(&text);
            fs::write(initial.path().join(output_filename(*kind)), converted).map_err(|e| io_error(e, StageName::Import))?;
        }

        if self.generate_run_history {
            if let Some(text) = &raw_metadata {
                let history = generate_run_history(text, Some(run));
                fs::write(initial.path().join("RunHistory.fcl"), history).map_err(|e| io_error(e, StageName::Import))?;
            }
        }

        self.copy_schema(initial.path())?;

        self.config_store
            .insert(run, &config_name, initial.path())
            .map_err(|e| e.with_stage(StageName::Import).with_run(run))?;

        if let Some(text) = &raw_metadata {
            let (start, stop) = extract_run_times(text);
            if start.is_some() && stop.is_some() && self.generate_run_history2 {
                let update = ScopedDir::create(&self.work_dir, &format!("import-{run}-update-")).map_err(|e| io_error(e, StageName::Import))?;
                let history2 = generate_run_history(text, Some(run));
                fs::write(update.path().join("RunHistory2.fcl"), history2).map_err(|e| io_error(e, StageName::Import))?;
                self.copy_schema(update.path())?;
                self.config_store
                    .update(run, &config_name, update.path())
                    .map_err(|e| e.with_stage(StageName::Import).with_run(run))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeStore {
        runs: Mutex<BTreeMap<u32, (String, Vec<String>)>>,
    }

    impl ConfigStore for FakeStore {
        fn list_runs(&self) -> Result<BTreeSet<u32>, ArchiverError> {
            Ok(self.runs.lock().unwrap().keys().copied().collect())
        }
        fn resolve_config_name(&self, run_number: u32) -> Result<String, ArchiverError> {
            self.runs
                .lock()
                .unwrap()
                .get(&run_number)
                .map(|(name, _)| name.clone())
                .ok_or_else(|| ArchiverError::ConfigurationStore {
                    message: "not-found".to_string(),
                    stage: None,
                    run: Some(run_number),
                    context: BTreeMap::new(),
                })
        }
        fn insert(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError> {
            let mut runs = self.runs.lock().unwrap();
            if runs.contains_key(&run_number) {
                return Err(ArchiverError::ConfigurationStore {
                    message: "already-exists".to_string(),
                    stage: None,
                    run: Some(run_number),
                    context: BTreeMap::new(),
                });
            }
            let files: Vec<String> = fs::read_dir(dir).unwrap().filter_map(|e| e.ok().map(|e| e.file_name().to_string_lossy().into_owned())).collect();
            runs.insert(run_number, (config_name.to_string(), files));
            Ok(())
        }
        fn update(&self, run_number: u32, config_name: &str, dir: &Utf8Path) -> Result<(), ArchiverError> {
            let mut runs = self.runs.lock().unwrap();
            let entry = runs.get_mut(&run_number).ok_or_else(|| ArchiverError::ConfigurationStore {
                message: "not-found".to_string(),
                stage: None,
                run: Some(run_number),
                context: BTreeMap::new(),
            })?;
            entry.0 = config_name.to_string();
            let mut extra: Vec<String> = fs::read_dir(dir).unwrap().filter_map(|e| e.ok().map(|e| e.file_name().to_string_lossy().into_owned())).collect();
            entry.1.append(&mut extra);
            Ok(())
        }
        fn export(&self, _run_number: u32, _destination_dir: &Utf8Path) -> Result<(), ArchiverError> {
            Ok(())
        }
    }

    fn write_run(root: &Utf8Path, run: u32, files: &[(&str, &str)]) {
        let dir = root.join(run.to_string());
        fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
    }

    #[test]
    fn discover_excludes_already_archived_runs() {
        let records = tempdir().unwrap();
        let records_root = Utf8Path::from_path(records.path()).unwrap();
        write_run(records_root, 1, &[]);
        write_run(records_root, 2, &[]);

        let store = Arc::new(FakeStore { runs: Mutex::new(BTreeMap::from([(1, (String::new(), vec![]))])) });
        let schema_dir = tempdir().unwrap();
        let work_dir = tempdir().unwrap();
        let stage = ImportStage {
            run_records_dir: records_root.to_owned(),
            config_store: store,
            converters: vec![],
            generate_run_history: false,
            generate_run_history2: false,
            schema_dir: Utf8Path::from_path(schema_dir.path()).unwrap().to_owned(),
            work_dir: Utf8Path::from_path(work_dir.path()).unwrap().to_owned(),
            state_path: Utf8Path::from_path(work_dir.path()).unwrap().join("state.json"),
            failure_log_path: Utf8Path::from_path(work_dir.path()).unwrap().join("failures.log"),
            permanent_skip_runs: BTreeSet::new(),
        };

        assert_eq!(stage.discover(false).unwrap(), vec![2]);
    }

    #[test]
    fn process_one_converts_recognized_files_and_inserts() {
        let records = tempdir().unwrap();
        let records_root = Utf8Path::from_path(records.path()).unwrap();
        write_run(records_root, 5, &[("metadata", "Config name: physics\n"), ("boot", "tpc01 localhost -1\n")]);

        let schema_dir = tempdir().unwrap();
        fs::write(Utf8Path::from_path(schema_dir.path()).unwrap().join("schema.fcl"), "schema\n").unwrap();
        let work_dir = tempdir().unwrap();
        let store = Arc::new(FakeStore { runs: Mutex::new(BTreeMap::new()) });

        let stage = ImportStage {
            run_records_dir: records_root.to_owned(),
            config_store: store.clone(),
            converters: vec![ConverterKind::Metadata, ConverterKind::Boot],
            generate_run_history: true,
            generate_run_history2: false,
            schema_dir: Utf8Path::from_path(schema_dir.path()).unwrap().to_owned(),
            work_dir: Utf8Path::from_path(work_dir.path()).unwrap().to_owned(),
            state_path: Utf8Path::from_path(work_dir.path()).unwrap().join("state.json"),
            failure_log_path: Utf8Path::from_path(work_dir.path()).unwrap().join("failures.log"),
            permanent_skip_runs: BTreeSet::new(),
        };

        stage.process_one(5).unwrap();
        let runs = store.runs.lock().unwrap();
        let (config_name, files) = runs.get(&5).unwrap();
        assert_eq!(config_name, "physics");
        assert!(files.contains(&"boot.fcl".to_string()));
        assert!(files.contains(&"metadata.fcl".to_string()));
        assert!(files.contains(&"RunHistory.fcl".to_string()));
        assert!(files.contains(&"schema.fcl".to_string()));
    }

    #[test]
    fn process_one_updates_with_run_history2_when_both_times_present() {
        let records = tempdir().unwrap();
        let records_root = Utf8Path::from_path(records.path()).unwrap();
        write_run(
            records_root,
            6,
            &[(
                "metadata",
                "Config name: physics\nDAQInterface start time: 2024-01-01T00:00:00Z\nDAQInterface stop time: 2024-01-01T01:00:00Z\n",
            )],
        );

        let schema_dir = tempdir().unwrap();
        fs::write(Utf8Path::from_path(schema_dir.path()).unwrap().join("schema.fcl"), "schema\n").unwrap();
        let work_dir = tempdir().unwrap();
        let store = Arc::new(FakeStore { runs: Mutex::new(BTreeMap::new()) });

        let stage = ImportStage {
            run_records_dir: records_root.to_owned(),
            config_store: store.clone(),
            converters: vec![ConverterKind::Metadata],
            generate_run_history: false,
            generate_run_history2: true,
            schema_dir: Utf8Path::from_path(schema_dir.path()).unwrap().to_owned(),
            work_dir: Utf8Path::from_path(work_dir.path()).unwrap().to_owned(),
            state_path: Utf8Path::from_path(work_dir.path()).unwrap().join("state.json"),
            failure_log_path: Utf8Path::from_path(work_dir.path()).unwrap().join("failures.log"),
            permanent_skip_runs: BTreeSet::new(),
        };

        stage.process_one(6).unwrap();
        let runs = store.runs.lock().unwrap();
        let (_, files) = runs.get(&6).unwrap();
        assert!(files.contains(&"RunHistory2.fcl".to_string()));
    }

    #[test]
    fn process_one_skips_permanently_skipped_runs() {
        let records = tempdir().unwrap();
        let records_root = Utf8Path::from_path(records.path()).unwrap();
        write_run(records_root, 9, &[]);
        let schema_dir = tempdir().unwrap();
        let work_dir = tempdir().unwrap();
        let stage = ImportStage {
            run_records_dir: records_root.to_owned(),
            config_store: Arc::new(FakeStore { runs: Mutex::new(BTreeMap::new()) }),
            converters: vec![],
            generate_run_history: false,
            generate_run_history2: false,
            schema_dir: Utf8Path::from_path(schema_dir.path()).unwrap().to_owned(),
            work_dir: Utf8Path::from_path(work_dir.path()).unwrap().to_owned(),
            state_path: Utf8Path::from_path(work_dir.path()).unwrap().join("state.json"),
            failure_log_path: Utf8Path::from_path(work_dir.path()).unwrap().join("failures.log"),
            permanent_skip_runs: BTreeSet::from([9]),
        };

        let err = stage.process_one(9).unwrap_err();
        assert!(matches!(err, ArchiverError::PermanentSkip { .. }));
    }
}
