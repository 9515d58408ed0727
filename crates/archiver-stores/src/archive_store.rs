//! The archive-store adapter: upload and download text blobs keyed by run
//! number over HTTP, using a blocking `reqwest` client so the stage
//! engine's own concurrency primitive supplies parallelism, not the HTTP
//! client's connection pool.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use archiver_utils::ArchiverError;

fn store_error(message: impl Into<String>, run: Option<u32>) -> ArchiverError {
    ArchiverError::ArchiveStore { message: message.into(), stage: None, run, context: BTreeMap::new() }
}

pub trait ArchiveStore: Send + Sync {
    fn list_runs(&self) -> Result<BTreeSet<u32>, ArchiverError>;
    /// Idempotent: if `run_number` is already present, returns a sentinel
    /// version identifier without failing.
    fn upload(&self, run_number: u32, blob_text: &str) -> Result<String, ArchiverError>;
    fn download(&self, run_number: u32) -> Result<String, ArchiverError>;
}

pub const ALREADY_PRESENT_VERSION: &str = "already-present";

pub struct HttpArchiveStore {
    client: reqwest::blocking::Client,
    base_url: String,
    folder: String,
    user: String,
    password: String,
}

impl HttpArchiveStore {
    /// Connects and validates reachability via a cheap version endpoint.
    /// Failure here is a hard, non-retryable error per the pipeline's
    /// startup contract.
    pub fn connect(
        base_url: impl Into<String>,
        folder: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ArchiverError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| store_error(e.to_string(), None))?;
        let base_url = base_url.into();

        let version_url = format!("{base_url}/version");
        let response = client
            .get(&version_url)
            .send()
            .map_err(|e| store_error(format!("reachability check failed: {e}"), None))?;
        if !response.status().is_success() {
            return Err(store_error(format!("reachability check returned {}", response.status()), None));
        }

        Ok(Self { client, base_url, folder: folder.into(), user: user.into(), password: password.into() })
    }

    fn record_url(&self, run_number: u32) -> String {
        format!("{}/{}/{run_number}", self.base_url, self.folder)
    }
}

impl ArchiveStore for HttpArchiveStore {
    fn list_runs(&self) -> Result<BTreeSet<u32>, ArchiverError> {
        let url = format!("{}/{}", self.base_url, self.folder);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|e| store_error(e.to_string(), None))?;
        if !response.status().is_success() {
            return Err(store_error(format!("list-runs returned {}", response.status()), None));
        }
        let body = response.text().map_err(|e| store_error(e.to_string(), None))?;
        Ok(body.lines().filter_map(|l| l.trim().parse::<u32>().ok()).collect())
    }

    fn upload(&self, run_number: u32, blob_text: &str) -> Result<String, ArchiverError> {
        let existing = self
            .client
            .head(self.record_url(run_number))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|e| store_error(e.to_string(), Some(run_number)))?;
        if existing.status().is_success() {
            tracing::warn!(run_number, "archive record already present, skipping upload");
            return Ok(ALREADY_PRESENT_VERSION.to_string());
        }

        let response = self
            .client
            .put(self.record_url(run_number))
            .basic_auth(&self.user, Some(&self.password))
            .body(blob_text.to_string())
            .send()
            .map_err(|e| store_error(e.to_string(), Some(run_number)))?;
        if !response.status().is_success() {
            return Err(store_error(format!("upload returned {}", response.status()), Some(run_number)));
        }
        response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| store_error("upload succeeded but server returned no version", Some(run_number)))
    }

    fn download(&self, run_number: u32) -> Result<String, ArchiverError> {
        let response = self
            .client
            .get(self.record_url(run_number))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|e| store_error(e.to_string(), Some(run_number)))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(store_error(format!("not-found: run {run_number}"), Some(run_number)));
        }
        if !response.status().is_success() {
            return Err(store_error(format!("download returned {}", response.status()), Some(run_number)));
        }
        response.text().map_err(|e| store_error(e.to_string(), Some(run_number)))
    }
}
