//! Builds the configuration-store and archive-store adapters named by a
//! loaded configuration document.

use std::sync::Arc;
use std::time::Duration;

use archiver_config::{ArchiveStoreConfig, ConfigStoreMode, ConfigurationStoreConfig};
use archiver_stores::{ArchiveStore, CliConfigStore, ConfigStore, HttpArchiveStore, RemoteConfigStore};
use archiver_utils::ArchiverError;
use camino::Utf8PathBuf;

pub fn build_config_store(cfg: &ConfigurationStoreConfig) -> Result<Arc<dyn ConfigStore>, ArchiverError> {
    match cfg.mode {
        ConfigStoreMode::Driver => Err(ArchiverError::configuration(
            "configuration_store.mode = driver has no in-process driver registered in this build",
        )),
        ConfigStoreMode::CliLocal => {
            let tool = Utf8PathBuf::from(&cfg.uri);
            Ok(Arc::new(CliConfigStore::new(tool, default_timeout())))
        }
        ConfigStoreMode::CliRemote => {
            let host = cfg.remote_host.clone().ok_or_else(|| {
                ArchiverError::configuration("configuration_store.mode = cli-remote requires remote_host")
            })?;
            let tool = Utf8PathBuf::from(&cfg.uri);
            Ok(Arc::new(RemoteConfigStore::new(host, tool, default_timeout())))
        }
    }
}

pub fn build_archive_store(cfg: &ArchiveStoreConfig) -> Result<Arc<dyn ArchiveStore>, ArchiverError> {
    let store = HttpArchiveStore::connect(
        cfg.url.clone(),
        cfg.folder.clone(),
        cfg.user.clone(),
        cfg.password.clone(),
        Duration::from_secs(cfg.timeout_seconds),
    )?;
    Ok(Arc::new(store))
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}
