pub mod compare_state;
pub mod report;
pub mod summary;

pub use compare_state::{compare_state, StateDiscrepancy};
pub use report::{build_report, PipelineReport};
pub use summary::SourceSummary;
