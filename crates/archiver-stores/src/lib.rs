pub mod archive_store;
pub mod config_store;
pub mod process;

pub use archive_store::{ArchiveStore, HttpArchiveStore, ALREADY_PRESENT_VERSION};
pub use config_store::{CliConfigStore, ConfigStore, ConfigStoreDriver, DriverConfigStore, RemoteConfigStore};
