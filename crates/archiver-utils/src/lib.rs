pub mod atomic_write;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{ArchiverError, StageName};
pub use logging::LogConfig;
