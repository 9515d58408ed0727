pub mod engine;
pub mod stage;

pub use engine::{run_failure_recovery, run_stage, StageOutcome, StageRunConfig};
pub use stage::Stage;
