//! Where each resolved config value came from, for `report-status` and
//! debugging output.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Overridden by a CLI flag after the file was parsed.
    Cli,
    /// Taken verbatim (or via an env var that was actually set) from the file.
    File,
    /// A `${NAME:-default}` placeholder whose environment variable was unset,
    /// so the literal default was used.
    EnvDefault,
    /// Never present in the file; a struct-level `#[serde(default)]` applied.
    Default,
}

pub type Attribution = BTreeMap<String, ConfigSource>;
