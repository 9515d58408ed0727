pub mod attribution;
pub mod model;
pub mod substitute;

pub use attribution::{Attribution, ConfigSource};
pub use model::*;

use archiver_utils::ArchiverError;
use camino::Utf8Path;

/// Load and fully resolve a configuration document: parse YAML, substitute
/// every `${...}` placeholder, then decode into the typed `Config`.
pub fn load(path: &Utf8Path) -> Result<Config, ArchiverError> {
    let (config, _) = load_with_attribution(path)?;
    Ok(config)
}

pub fn load_with_attribution(path: &Utf8Path) -> Result<(Config, Attribution), ArchiverError> {
    let text = std::fs::read_to_string(path.as_std_path())
        .map_err(|e| ArchiverError::configuration(format!("cannot read '{path}': {e}")))?;
    let raw: serde_yaml::Value = serde_yaml::from_str(&text)
        .map_err(|e| ArchiverError::configuration(format!("invalid YAML in '{path}': {e}")))?;
    let (resolved, attribution) = substitute::substitute_with_attribution(&raw)?;
    let config: Config = serde_yaml::from_value(resolved)
        .map_err(|e| ArchiverError::configuration(format!("invalid configuration in '{path}': {e}")))?;
    Ok((config, attribution))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn write_config(dir: &tempfile::TempDir, yaml: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("config.yaml")).unwrap();
        std::fs::write(&path, yaml).unwrap();
        path
    }

    const MINIMAL: &str = r#"
app:
  work_dir: /var/archiver
source_files:
  run_records_dir: /data/runs
configuration_store:
  uri: "mongodb://localhost/configs"
  mode: driver
  remote_host: null
  schema_dir: /etc/archiver/schema
archive_store:
  url: "https://archive.example.org"
  folder: "runs"
  user: "archiver"
  password: "${ARCHIVER_TEST_PW:-unset}"
fhiclize_generate:
  converters:
    - metadata
    - boot
"#;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, MINIMAL);
        let config = load(&path).unwrap();
        assert_eq!(config.app.parallel_workers, 4);
        assert_eq!(config.app.run_process_retries, 2);
        assert_eq!(config.app.log.max_size_mb, 500);
        assert_eq!(config.archive_store.password, "unset");
        assert_eq!(config.fhiclize_generate.converters.len(), 2);
    }

    #[test]
    fn unknown_converter_name_fails_at_load_time() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = MINIMAL.replace("- metadata", "- not_a_real_converter");
        let path = write_config(&dir, &yaml);
        assert!(load(&path).is_err());
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.yaml")).unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ArchiverError::Configuration { .. }));
    }

    #[test]
    fn attribution_is_returned_alongside_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, MINIMAL);
        let (_, attribution) = load_with_attribution(&path).unwrap();
        assert_eq!(
            attribution.get("archive_store.password"),
            Some(&ConfigSource::EnvDefault)
        );
    }
}
