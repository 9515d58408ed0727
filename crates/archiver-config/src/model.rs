//! Typed configuration document.
//!
//! Mirrors the section list exactly: `app`, `source_files`,
//! `configuration_store`, `archive_store`, `fhiclize_generate`,
//! `reporting`, `fuzz`.

use camino::Utf8PathBuf;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub source_files: SourceFilesConfig,
    pub configuration_store: ConfigurationStoreConfig,
    pub archive_store: ArchiveStoreConfig,
    pub fhiclize_generate: FhiclizeGenerateConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
    #[serde(default)]
    pub fuzz: FuzzConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub work_dir: Utf8PathBuf,
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
    #[serde(default = "default_run_process_retries")]
    pub run_process_retries: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
    #[serde(default)]
    pub log: LogSectionConfig,
}

fn default_parallel_workers() -> usize {
    4
}
fn default_run_process_retries() -> u32 {
    2
}
fn default_retry_delay_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSectionConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file_path: Option<Utf8PathBuf>,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
    #[serde(default = "default_backups")]
    pub backups: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_size_mb() -> u64 {
    500
}
fn default_max_age_days() -> u64 {
    14
}
fn default_backups() -> usize {
    5
}

impl Default for LogSectionConfig {
    fn default() -> Self {
        LogSectionConfig {
            level: default_log_level(),
            file_path: None,
            max_size_mb: default_max_size_mb(),
            max_age_days: default_max_age_days(),
            backups: default_backups(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceFilesConfig {
    pub run_records_dir: Utf8PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigStoreMode {
    Driver,
    CliLocal,
    CliRemote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigurationStoreConfig {
    pub uri: String,
    pub mode: ConfigStoreMode,
    pub remote_host: Option<String>,
    pub schema_dir: Utf8PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveStoreConfig {
    pub url: String,
    pub folder: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_archive_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_archive_timeout_seconds() -> u64 {
    300
}

/// The closed set from which `fhiclize_generate.converters` is drawn.
/// Unknown names fail at config-load time because `serde` rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    Metadata,
    Boot,
    Settings,
    Setup,
    Environment,
    Ranks,
    KnownBoardreadersList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FhiclizeGenerateConfig {
    pub converters: Vec<ConverterKind>,
    #[serde(default)]
    pub generate_run_history: bool,
    #[serde(default)]
    pub generate_run_history2: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportingConfig {
    pub email: Option<String>,
    pub webhook: Option<String>,
    #[serde(default)]
    pub metrics: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FuzzConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub permanent_skip_runs: Vec<u32>,
}
