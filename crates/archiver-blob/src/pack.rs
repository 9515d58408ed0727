//! Packs a directory of files into the delimited text blob and unpacks the
//! inverse. The wire format is fixed by the archive store's contract, not
//! negotiable per-run.

use std::collections::{BTreeMap, HashSet};
use std::fs;

use archiver_utils::ArchiverError;
use camino::Utf8Path;
use once_cell::sync::Lazy;
use regex::Regex;

const TAIL_ORDER: [&str; 9] = [
    "boot.fcl",
    "known_boardreaders_list.fcl",
    "setup.fcl",
    "environment.fcl",
    "metadata.fcl",
    "settings.fcl",
    "ranks.fcl",
    "RunHistory.fcl",
    "RunHistory2.fcl",
];

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\n#####\n(.+?):\n#####\n").unwrap());

fn blob_creation_error(message: impl Into<String>, run: u32) -> ArchiverError {
    ArchiverError::BlobCreation {
        message: message.into(),
        stage: None,
        run: Some(run),
        context: BTreeMap::new(),
    }
}

/// Order the files for packing: everything outside the fixed tail set,
/// sorted case-insensitively, followed by the tail set in its fixed order
/// (skipping tail names that don't exist in `names`).
fn order_files(names: &[String]) -> Vec<String> {
    let tail_set: HashSet<&str> = TAIL_ORDER.iter().copied().collect();
    let mut head: Vec<String> = names.iter().filter(|n| !tail_set.contains(n.as_str())).cloned().collect();
    head.sort_by_key(|n| n.to_lowercase());

    let mut ordered = head;
    for tail_name in TAIL_ORDER {
        if names.iter().any(|n| n == tail_name) {
            ordered.push(tail_name.to_string());
        }
    }
    ordered
}

fn pack_timestamp() -> String {
    chrono::Utc::now().format("%b %d %H:%M UTC").to_string()
}

/// Pack every regular file directly under `dir` into one text blob for
/// `run_number`. Non-UTF-8 bytes are decoded permissively.
pub fn pack(run_number: u32, dir: &Utf8Path) -> Result<String, ArchiverError> {
    let read_dir = fs::read_dir(dir).map_err(|e| blob_creation_error(format!("reading {dir}: {e}"), run_number))?;

    let mut names = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| blob_creation_error(format!("reading {dir}: {e}"), run_number))?;
        let file_type = entry
            .file_type()
            .map_err(|e| blob_creation_error(format!("reading {dir}: {e}"), run_number))?;
        if file_type.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    let ordered = order_files(&names);
    let timestamp = pack_timestamp();

    let mut out = String::new();
    out.push_str("Start of Record\n");
    out.push_str(&format!("Run Number: {run_number}\n"));
    out.push_str(&format!("Packed on {timestamp}\n"));

    for name in &ordered {
        let bytes = fs::read(dir.join(name)).map_err(|e| blob_creation_error(format!("reading {name}: {e}"), run_number))?;
        let content = String::from_utf8_lossy(&bytes);
        out.push('\n');
        out.push_str("#####\n");
        out.push_str(&format!("{name}:\n"));
        out.push_str("#####\n");
        out.push_str(&content);
    }

    out.push('\n');
    out.push_str("End of Record\n");
    out.push_str(&format!("Run Number: {run_number}\n"));
    out.push_str(&format!("Packed on {timestamp}\n"));
    Ok(out)
}

/// Parse a blob back into its constituent files. Fails if the delimiter
/// regex matches zero times.
pub fn unpack(blob: &str) -> Result<BTreeMap<String, String>, ArchiverError> {
    let headers: Vec<_> = HEADER.captures_iter(blob).collect();
    if headers.is_empty() {
        return Err(blob_creation_error("no-delimiters: blob has no file sections", 0));
    }

    let mut files = BTreeMap::new();
    for (i, cap) in headers.iter().enumerate() {
        let whole = cap.get(0).unwrap();
        let filename = cap.get(1).unwrap().as_str().to_string();
        let content_start = whole.end();
        let content_end = if i + 1 < headers.len() {
            headers[i + 1].get(0).unwrap().start()
        } else {
            blob[content_start..]
                .find("\nEnd of Record")
                .map(|p| content_start + p)
                .unwrap_or(blob.len())
        };
        files.insert(filename, blob[content_start..content_end].to_string());
    }
    Ok(files)
}
