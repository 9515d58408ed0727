//! Top-level lifecycle: load configuration, configure logging, acquire the
//! single-instance lock, install shutdown handling, run the selected mode,
//! then release the lock on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use archiver_config::Config;
use archiver_engine::{run_failure_recovery, run_stage, Stage, StageRunConfig};
use archiver_lock::FileLock;
use archiver_report::{build_report, compare_state, PipelineReport, StateDiscrepancy};
use archiver_signal::ShutdownCoordinator;
use archiver_stages::{recover_import_state, recover_migrate_state};
use archiver_utils::logging::{self, LogConfig};
use archiver_utils::{ArchiverError, StageName};

use crate::args::Cli;
use crate::mode::Mode;
use crate::stages::{build_import_stage, build_migrate_stage};
use crate::stores::{build_archive_store, build_config_store};

/// Unhandled-error exit code, reserved for failures that never reach a
/// structured [`ArchiverError`] (runtime construction, signal installation).
const UNHANDLED_EXIT_CODE: i32 = 2;
const INTERRUPTED_EXIT_CODE: i32 = 130;

pub fn run(cli: Cli) -> i32 {
    let config = match archiver_config::load(&cli.config_file) {
        Ok(config) => config,
        Err(err) => return err.to_exit_code(),
    };

    let log_config = LogConfig {
        level: config.app.log.level.clone(),
        verbose: cli.verbose,
        file_path: config.app.log.file_path.clone(),
        max_size_mb: config.app.log.max_size_mb,
        max_age_days: config.app.log.max_age_days,
        backups: config.app.log.backups,
    };
    if let Err(err) = logging::init(&log_config) {
        eprintln!("failed to configure logging: {err}");
        return UNHANDLED_EXIT_CODE;
    }

    let lock_path = config.app.work_dir.join(".archiver.lock");
    let lock = match FileLock::acquire(&lock_path) {
        Ok(lock) => lock,
        Err(err) => {
            tracing::error!(error = %err, "failed to acquire lock");
            return ArchiverError::lock_held(err.to_string()).to_exit_code();
        }
    };

    let coordinator = ShutdownCoordinator::new();
    if let Err(err) = coordinator.install() {
        tracing::error!(error = %err, "failed to install signal handler");
        return UNHANDLED_EXIT_CODE;
    }
    let watcher = lock.spawn_watcher(coordinator.shutdown_flag());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!(error = %err, "failed to create async runtime");
            watcher.shutdown();
            drop(lock);
            return UNHANDLED_EXIT_CODE;
        }
    };

    let mode = Mode::from_cli(&cli);
    let outcome = rt.block_on(dispatch(&cli, &config, mode, coordinator.shutdown_flag()));

    watcher.shutdown();
    drop(lock);

    match outcome {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "pipeline run failed");
            err.to_exit_code()
        }
    }
}

async fn dispatch(
    cli: &Cli,
    config: &Config,
    mode: Mode,
    shutdown: Arc<AtomicBool>,
) -> Result<i32, ArchiverError> {
    let stage_config = StageRunConfig {
        parallel_workers: config.app.parallel_workers,
        run_process_retries: config.app.run_process_retries,
        retry_delay_seconds: config.app.retry_delay_seconds,
    };

    match mode {
        Mode::ReportStatus => {
            let config_store = build_config_store(&config.configuration_store)?;
            let archive_store = build_archive_store(&config.archive_store)?;
            let report = build_report(&config.source_files.run_records_dir, &config_store, &archive_store)?;
            print_report(&report);

            if cli.compare_state {
                print_discrepancies(
                    "import",
                    &compare_state(
                        StageName::Import,
                        &config.app.work_dir.join("importer_state.json"),
                        &config.app.work_dir.join("import_failures.log"),
                        &config_store.list_runs()?,
                    ),
                );
                print_discrepancies(
                    "migrate",
                    &compare_state(
                        StageName::Migrate,
                        &config.app.work_dir.join("migrator_state.json"),
                        &config.app.work_dir.join("migrate_failures.log"),
                        &archive_store.list_runs()?,
                    ),
                );
            }
            Ok(0)
        }

        Mode::RecoverImportState => {
            let config_store = build_config_store(&config.configuration_store)?;
            let watermark = recover_import_state(
                &config.app.work_dir.join("importer_state.json"),
                &config.app.work_dir.join("import_failures.log"),
                &config.source_files.run_records_dir,
                &config_store,
            )?;
            println!("import watermark recovered: {watermark:?}");
            Ok(0)
        }

        Mode::RecoverMigrateState => {
            let config_store = build_config_store(&config.configuration_store)?;
            let archive_store = build_archive_store(&config.archive_store)?;
            let watermark = recover_migrate_state(
                &config.app.work_dir.join("migrator_state.json"),
                &config.app.work_dir.join("migrate_failures.log"),
                &config_store,
                &archive_store,
            )?;
            println!("migrate watermark recovered: {watermark:?}");
            Ok(0)
        }

        Mode::ImportOnly => {
            let config_store = build_config_store(&config.configuration_store)?;
            let stage = build_import_stage(config, config_store);
            let outcome = run_stage(Arc::new(stage) as Arc<dyn Stage>, stage_config, cli.incremental, Arc::clone(&shutdown)).await?;
            Ok(exit_code_for(&outcome, &shutdown))
        }

        Mode::MigrateOnly => {
            let config_store = build_config_store(&config.configuration_store)?;
            let archive_store = build_archive_store(&config.archive_store)?;
            let stage = build_migrate_stage(config, config_store, archive_store, cli.validate);
            let outcome = run_stage(Arc::new(stage) as Arc<dyn Stage>, stage_config, cli.incremental, Arc::clone(&shutdown)).await?;
            Ok(exit_code_for(&outcome, &shutdown))
        }

        Mode::RetryFailedImport => {
            let config_store = build_config_store(&config.configuration_store)?;
            let stage = build_import_stage(config, config_store);
            let outcome = run_failure_recovery(Arc::new(stage) as Arc<dyn Stage>, stage_config, Arc::clone(&shutdown)).await?;
            Ok(exit_code_for(&outcome, &shutdown))
        }

        Mode::RetryFailedMigrate => {
            let config_store = build_config_store(&config.configuration_store)?;
            let archive_store = build_archive_store(&config.archive_store)?;
            let stage = build_migrate_stage(config, config_store, archive_store, cli.validate);
            let outcome = run_failure_recovery(Arc::new(stage) as Arc<dyn Stage>, stage_config, Arc::clone(&shutdown)).await?;
            Ok(exit_code_for(&outcome, &shutdown))
        }

        Mode::FullPipeline => {
            let config_store = build_config_store(&config.configuration_store)?;
            let archive_store = build_archive_store(&config.archive_store)?;

            let import_stage = build_import_stage(config, Arc::clone(&config_store));
            let import_outcome =
                run_stage(Arc::new(import_stage) as Arc<dyn Stage>, stage_config, cli.incremental, Arc::clone(&shutdown)).await?;
            if shutdown.load(Ordering::SeqCst) {
                return Ok(exit_code_for(&import_outcome, &shutdown));
            }

            let migrate_stage = build_migrate_stage(config, config_store, archive_store, cli.validate);
            let migrate_outcome =
                run_stage(Arc::new(migrate_stage) as Arc<dyn Stage>, stage_config, cli.incremental, Arc::clone(&shutdown)).await?;

            if !import_outcome.is_clean() || !migrate_outcome.is_clean() {
                Ok(exit_code_for(&migrate_outcome, &shutdown))
            } else {
                Ok(0)
            }
        }
    }
}

/// 130 when the run was cut short by a shutdown request, otherwise 0 for a
/// fully clean outcome and 1 when any run failed or was cancelled.
fn exit_code_for(outcome: &archiver_engine::StageOutcome, shutdown: &Arc<AtomicBool>) -> i32 {
    if shutdown.load(Ordering::SeqCst) && !outcome.cancelled.is_empty() {
        INTERRUPTED_EXIT_CODE
    } else if outcome.is_clean() {
        0
    } else {
        1
    }
}

fn print_report(report: &PipelineReport) {
    println!(
        "filesystem:            total={} range={:?}..{:?} gaps={:?}",
        report.filesystem.total, report.filesystem.min, report.filesystem.max, report.filesystem.gaps
    );
    println!(
        "configuration store:   total={} range={:?}..{:?} gaps={:?}",
        report.configuration_store.total, report.configuration_store.min, report.configuration_store.max, report.configuration_store.gaps
    );
    println!(
        "archive store:         total={} range={:?}..{:?} gaps={:?}",
        report.archive_store.total, report.archive_store.min, report.archive_store.max, report.archive_store.gaps
    );
    println!("present in filesystem but not configuration store: {:?}", report.fs_not_in_configuration_store);
    println!("present in configuration store but not archive store: {:?}", report.configuration_store_not_in_archive_store);
}

fn print_discrepancies(label: &str, discrepancies: &[StateDiscrepancy]) {
    if discrepancies.is_empty() {
        println!("{label}: watermarks match observed presence");
        return;
    }
    for d in discrepancies {
        println!("{label}: {} watermark={} actual={}", d.field, d.watermark_value, d.actual_value);
    }
}
