//! Re-exports the command-line entry point. All behavior lives in
//! `archiver-cli` and the crates it composes; this crate exists so the
//! binary and library share one name on crates.io-style layouts.

pub use archiver_cli::{run, Cli};
