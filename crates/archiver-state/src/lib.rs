pub mod failure_log;
pub mod recover;
pub mod watermark;

pub use failure_log::{append_failures, parse_failure_log, write_failures};
pub use recover::recover;
pub use watermark::{advance_attempted, advance_contiguous, incremental_start, read_state, write_state, Watermark};
