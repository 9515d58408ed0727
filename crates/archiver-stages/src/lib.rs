pub mod fs_util;
pub mod import;
pub mod migrate;
pub mod recover;

pub use import::ImportStage;
pub use migrate::MigrateStage;
pub use recover::{recover_import_state, recover_migrate_state};
