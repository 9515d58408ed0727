//! Extracts specific FHiCL key/value pairs from specific files inside a
//! blob, for post-pack sanity checking. Never fails the caller's process;
//! every problem is captured in the returned map.

use std::collections::BTreeMap;

use regex::Regex;

use crate::pack::unpack;

/// `filename -> (param_label -> fhicl_key)`.
pub type ValidatorSpec = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub error_count: usize,
    pub values: BTreeMap<String, Result<String, String>>,
}

/// Validate a packed blob against `spec`. Each entry in `values` is either
/// the extracted value or a human-readable error message; `error_count`
/// counts the latter.
pub fn validate(blob: &str, spec: &ValidatorSpec) -> ValidationResult {
    let mut values = BTreeMap::new();
    let mut error_count = 0;

    let files = unpack(blob).unwrap_or_default();

    for (filename, params) in spec {
        let Some(content) = files.get(filename) else {
            for label in params.keys() {
                values.insert(label.clone(), Err(format!("{filename} not present in blob")));
                error_count += 1;
            }
            continue;
        };

        for (label, fhicl_key) in params {
            let pattern = format!(r"(?m)^{}:\s+(.+)$", regex::escape(fhicl_key));
            let re = Regex::new(&pattern).expect("escaped key is always a valid pattern");
            let matches: Vec<_> = re.captures_iter(content).collect();
            match matches.len() {
                0 => {
                    values.insert(label.clone(), Err(format!("key {fhicl_key} not found in {filename}")));
                    error_count += 1;
                }
                1 => {
                    values.insert(label.clone(), Ok(matches[0].get(1).unwrap().as_str().to_string()));
                }
                n => {
                    values.insert(label.clone(), Err(format!("key {fhicl_key} matched {n} times in {filename}")));
                    error_count += 1;
                }
            }
        }
    }

    ValidationResult { error_count, values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::pack;
    use camino::Utf8Path;
    use std::fs;
    use tempfile::tempdir;

    fn spec_for_config_name() -> ValidatorSpec {
        let mut inner = BTreeMap::new();
        inner.insert("config_name".to_string(), "config_name".to_string());
        let mut spec = BTreeMap::new();
        spec.insert("metadata.fcl".to_string(), inner);
        spec
    }

    #[test]
    fn missing_file_is_reported_without_panic() {
        let dir = tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(root.join("boot.fcl"), "y\n").unwrap();
        let blob = pack(1, root).unwrap();

        let result = validate(&blob, &spec_for_config_name());
        assert_eq!(result.error_count, 1);
        assert!(result.values["config_name"].as_ref().unwrap_err().contains("metadata.fcl"));
    }

    #[test]
    fn single_match_extracts_value() {
        let dir = tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(root.join("metadata.fcl"), "config_name: \"standard\"\nhost: \"localhost\"\n").unwrap();
        let blob = pack(1, root).unwrap();

        let result = validate(&blob, &spec_for_config_name());
        assert_eq!(result.error_count, 0);
        assert_eq!(result.values["config_name"].as_deref(), Ok("\"standard\""));
    }

    #[test]
    fn duplicate_key_is_an_error() {
        let dir = tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        fs::write(root.join("metadata.fcl"), "config_name: \"a\"\nconfig_name: \"b\"\n").unwrap();
        let blob = pack(1, root).unwrap();

        let result = validate(&blob, &spec_for_config_name());
        assert_eq!(result.error_count, 1);
        assert!(result.values["config_name"].is_err());
    }

    #[test]
    fn unparseable_blob_fails_every_key() {
        let result = validate("not a blob", &spec_for_config_name());
        assert_eq!(result.error_count, 1);
    }
}
