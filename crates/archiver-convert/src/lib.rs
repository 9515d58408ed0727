pub mod generic;
pub mod metadata;
pub mod registry;
pub mod rules;
pub mod run_history;

pub use metadata::{convert_metadata, extract_config_name, extract_run_times};
pub use registry::{converter_for, output_filename, source_filename};
pub use run_history::generate_run_history;
