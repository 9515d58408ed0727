use crate::args::Cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    FullPipeline,
    ImportOnly,
    MigrateOnly,
    RetryFailedImport,
    RetryFailedMigrate,
    ReportStatus,
    RecoverImportState,
    RecoverMigrateState,
}

impl Mode {
    pub fn from_cli(cli: &Cli) -> Mode {
        if cli.import_only {
            Mode::ImportOnly
        } else if cli.migrate_only {
            Mode::MigrateOnly
        } else if cli.retry_failed_import {
            Mode::RetryFailedImport
        } else if cli.retry_failed_migrate {
            Mode::RetryFailedMigrate
        } else if cli.report_status {
            Mode::ReportStatus
        } else if cli.recover_import_state {
            Mode::RecoverImportState
        } else if cli.recover_migrate_state {
            Mode::RecoverMigrateState
        } else {
            Mode::FullPipeline
        }
    }
}
