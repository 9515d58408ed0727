//! The five-hook contract a stage implements; `archiver-stages` supplies
//! the import and migrate bodies.

use archiver_utils::ArchiverError;
use camino::Utf8Path;

pub trait Stage: Send + Sync {
    fn name(&self) -> &str;
    fn state_file_path(&self) -> &Utf8Path;
    fn failure_log_path(&self) -> &Utf8Path;
    fn discover(&self, incremental: bool) -> Result<Vec<u32>, ArchiverError>;
    fn process_one(&self, run: u32) -> Result<(), ArchiverError>;

    /// `Some(1)` when the stage's destination adapter can only serve one
    /// call at a time; the engine clamps its worker pool to this value.
    fn max_concurrency(&self) -> Option<usize> {
        None
    }
}
