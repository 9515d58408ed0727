pub mod args;
pub mod dispatch;
pub mod mode;
pub mod stages;
pub mod stores;

pub use args::Cli;
pub use dispatch::run;
pub use mode::Mode;
