//! Enumerates all three data sources and builds the presence/gap report.

use std::sync::Arc;

use archiver_stages::fs_util::discover_run_directories;
use archiver_stores::{ArchiveStore, ConfigStore};
use archiver_utils::{ArchiverError, StageName};
use camino::Utf8Path;

use crate::summary::{differential, SourceSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub filesystem: SourceSummary,
    pub configuration_store: SourceSummary,
    pub archive_store: SourceSummary,
    pub fs_not_in_configuration_store: Vec<u32>,
    pub configuration_store_not_in_archive_store: Vec<u32>,
}

pub fn build_report(
    run_records_dir: &Utf8Path,
    config_store: &Arc<dyn ConfigStore>,
    archive_store: &Arc<dyn ArchiveStore>,
) -> Result<PipelineReport, ArchiverError> {
    let filesystem_runs = discover_run_directories(run_records_dir, StageName::Import)?;
    let configured_runs = config_store.list_runs()?;
    let archived_runs = archive_store.list_runs()?;

    Ok(PipelineReport {
        fs_not_in_configuration_store: differential(&filesystem_runs, &configured_runs),
        configuration_store_not_in_archive_store: differential(&configured_runs, &archived_runs),
        filesystem: SourceSummary::from_runs(&filesystem_runs),
        configuration_store: SourceSummary::from_runs(&configured_runs),
        archive_store: SourceSummary::from_runs(&archived_runs),
    })
}
