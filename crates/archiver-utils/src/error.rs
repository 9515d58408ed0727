//! Shared error type for the pipeline.
//!
//! Every stage, store adapter, and converter reports failures through
//! `ArchiverError` so the stage engine can decide whether to retry, the
//! CLI can map a failure to an exit code, and the failure log can record
//! a stable kind name regardless of which crate raised it.

use std::collections::BTreeMap;
use std::fmt;

/// The stage a run was being processed by when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    Import,
    Migrate,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageName::Import => write!(f, "import"),
            StageName::Migrate => write!(f, "migrate"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiverError {
    #[error("configuration error{}: {message}", stage_suffix(.stage, .run))]
    Configuration {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error("lock held by another instance{}: {message}", stage_suffix(.stage, .run))]
    LockHeld {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error("configuration store error{}: {message}", stage_suffix(.stage, .run))]
    ConfigurationStore {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error("archive store error{}: {message}", stage_suffix(.stage, .run))]
    ArchiveStore {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error("fcl preparation error{}: {message}", stage_suffix(.stage, .run))]
    FclPreparation {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error("blob creation error{}: {message}", stage_suffix(.stage, .run))]
    BlobCreation {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error("verification error{}: {message}", stage_suffix(.stage, .run))]
    Verification {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error("reporting error{}: {message}", stage_suffix(.stage, .run))]
    Reporting {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error("permanent skip{}: {message}", stage_suffix(.stage, .run))]
    PermanentSkip {
        message: String,
        stage: Option<StageName>,
        run: Option<u32>,
        context: BTreeMap<String, String>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn stage_suffix(stage: &Option<StageName>, run: &Option<u32>) -> String {
    match (stage, run) {
        (Some(s), Some(r)) => format!(" (stage={s}, run={r})"),
        (Some(s), None) => format!(" (stage={s})"),
        (None, Some(r)) => format!(" (run={r})"),
        (None, None) => String::new(),
    }
}

impl ArchiverError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ArchiverError::Configuration {
            message: message.into(),
            stage: None,
            run: None,
            context: BTreeMap::new(),
        }
    }

    pub fn lock_held(message: impl Into<String>) -> Self {
        ArchiverError::LockHeld {
            message: message.into(),
            stage: None,
            run: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach stage/run/context to an already-constructed error, returning
    /// it unchanged if it has no such fields (e.g. `Io`).
    pub fn with_stage(mut self, stage: StageName) -> Self {
        self.set_stage(Some(stage));
        self
    }

    pub fn with_run(mut self, run: u32) -> Self {
        self.set_run(Some(run));
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(ctx) = self.context_mut() {
            ctx.insert(key.into(), value.into());
        }
        self
    }

    fn set_stage(&mut self, new_stage: Option<StageName>) {
        use ArchiverError::*;
        match self {
            Configuration { stage, .. }
            | LockHeld { stage, .. }
            | ConfigurationStore { stage, .. }
            | ArchiveStore { stage, .. }
            | FclPreparation { stage, .. }
            | BlobCreation { stage, .. }
            | Verification { stage, .. }
            | Reporting { stage, .. }
            | PermanentSkip { stage, .. } => *stage = new_stage,
            Io(_) => {}
        }
    }

    fn set_run(&mut self, new_run: Option<u32>) {
        use ArchiverError::*;
        match self {
            Configuration { run, .. }
            | LockHeld { run, .. }
            | ConfigurationStore { run, .. }
            | ArchiveStore { run, .. }
            | FclPreparation { run, .. }
            | BlobCreation { run, .. }
            | Verification { run, .. }
            | Reporting { run, .. }
            | PermanentSkip { run, .. } => *run = new_run,
            Io(_) => {}
        }
    }

    fn context_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        use ArchiverError::*;
        match self {
            Configuration { context, .. }
            | LockHeld { context, .. }
            | ConfigurationStore { context, .. }
            | ArchiveStore { context, .. }
            | FclPreparation { context, .. }
            | BlobCreation { context, .. }
            | Verification { context, .. }
            | Reporting { context, .. }
            | PermanentSkip { context, .. } => Some(context),
            Io(_) => None,
        }
    }

    /// Whether the stage engine's retry loop should reattempt the run that
    /// produced this error.
    pub fn to_retryable(&self) -> bool {
        matches!(
            self,
            ArchiverError::ConfigurationStore { .. }
                | ArchiverError::ArchiveStore { .. }
                | ArchiverError::FclPreparation { .. }
                | ArchiverError::BlobCreation { .. }
                | ArchiverError::Verification { .. }
        )
    }

    /// Process exit code this error should surface as, per the CLI's exit
    /// code table (0 success, 1 known error, 2 unhandled, 130 interrupted).
    pub fn to_exit_code(&self) -> i32 {
        match self {
            ArchiverError::Configuration { .. } | ArchiverError::LockHeld { .. } => 1,
            ArchiverError::Reporting { .. } => 0,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_spec_table() {
        assert!(ArchiverError::configuration("x").to_retryable() == false);
        assert!(ArchiverError::lock_held("x").to_retryable() == false);
        let store_err = ArchiverError::ConfigurationStore {
            message: "x".into(),
            stage: None,
            run: None,
            context: BTreeMap::new(),
        };
        assert!(store_err.to_retryable());
    }

    #[test]
    fn with_stage_and_run_attach_to_displayable_variants() {
        let err = ArchiverError::configuration("bad field")
            .with_stage(StageName::Import)
            .with_run(42)
            .with_context("field", "source_files.root");
        let rendered = err.to_string();
        assert!(rendered.contains("stage=import"));
        assert!(rendered.contains("run=42"));
    }

    #[test]
    fn io_error_has_no_stage_suffix_and_is_not_retryable() {
        let io_err: ArchiverError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(!io_err.to_retryable());
    }

    #[test]
    fn configuration_is_fatal_with_exit_code_one() {
        assert_eq!(ArchiverError::configuration("x").to_exit_code(), 1);
    }
}
