//! Command-line surface. Exactly one mode flag may be given; its absence
//! means full-pipeline.

use camino::Utf8PathBuf;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "archiver")]
#[command(about = "Two-stage run-record archival pipeline: source filesystem to configuration store to archive store")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(default_value = "config.yaml")]
    pub config_file: Utf8PathBuf,

    /// Skip work at or below the stage's incremental start point.
    #[arg(long)]
    pub incremental: bool,

    /// Run the import stage only.
    #[arg(long, group = "mode")]
    pub import_only: bool,

    /// Run the migrate stage only.
    #[arg(long, group = "mode")]
    pub migrate_only: bool,

    /// Reprocess runs recorded in the import failure log.
    #[arg(long, group = "mode")]
    pub retry_failed_import: bool,

    /// Reprocess runs recorded in the migrate failure log.
    #[arg(long, group = "mode")]
    pub retry_failed_migrate: bool,

    /// Print a presence/gap report across all three data sources.
    #[arg(long, group = "mode")]
    pub report_status: bool,

    /// Rebuild the import watermark and failure log from the stores.
    #[arg(long, group = "mode")]
    pub recover_import_state: bool,

    /// Rebuild the migrate watermark and failure log from the stores.
    #[arg(long, group = "mode")]
    pub recover_migrate_state: bool,

    /// With `--report-status`, cross-check watermarks against actual presence.
    #[arg(long)]
    pub compare_state: bool,

    /// In migrate, add an end-to-end MD5 round-trip check after upload.
    #[arg(long)]
    pub validate: bool,

    /// Debug log level.
    #[arg(short, long)]
    pub verbose: bool,
}
