//! Two-pass parse: raw YAML, then `${...}` substitution, then typed decode.
//!
//! Two reference forms are recognized inside `${...}`:
//! - `${NAME}` / `${NAME:-default}` — process environment variable, with an
//!   optional default if unset.
//! - `${section.key}` — another scalar elsewhere in the document, resolved
//!   on demand (forward references are fine; circular ones are caught).

use crate::attribution::{Attribution, ConfigSource};
use archiver_utils::ArchiverError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::collections::HashSet;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

struct Resolver<'a> {
    root: &'a serde_yaml::Value,
    cache: HashMap<String, String>,
    visiting: HashSet<String>,
    attribution: Attribution,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a serde_yaml::Value) -> Self {
        Resolver {
            root,
            cache: HashMap::new(),
            visiting: HashSet::new(),
            attribution: Attribution::new(),
        }
    }

    fn resolve_path(&mut self, path: &str) -> Result<String, ArchiverError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(cached.clone());
        }
        if !self.visiting.insert(path.to_string()) {
            return Err(ArchiverError::configuration(format!(
                "circular reference detected resolving '{path}'"
            )));
        }

        let raw = lookup_path(self.root, path).ok_or_else(|| {
            ArchiverError::configuration(format!("undefined reference '${{{path}}}'"))
        })?;
        let raw_str = scalar_to_string(raw).ok_or_else(|| {
            ArchiverError::configuration(format!(
                "'{path}' does not refer to a scalar value and cannot be substituted"
            ))
        })?;
        let resolved = self.substitute_str(&raw_str, path)?;

        self.visiting.remove(path);
        self.cache.insert(path.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn substitute_str(&mut self, input: &str, path: &str) -> Result<String, ArchiverError> {
        if !input.contains("${") {
            return Ok(input.to_string());
        }
        let mut result = String::with_capacity(input.len());
        let mut last_end = 0;
        for caps in PLACEHOLDER.captures_iter(input) {
            let whole = caps.get(0).unwrap();
            result.push_str(&input[last_end..whole.start()]);
            let expr = &caps[1];
            result.push_str(&self.resolve_expr(expr, path)?);
            last_end = whole.end();
        }
        result.push_str(&input[last_end..]);
        Ok(result)
    }

    fn resolve_expr(&mut self, expr: &str, path: &str) -> Result<String, ArchiverError> {
        if expr.contains('.') {
            return self.resolve_path(expr);
        }
        let (name, default) = match expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (expr, None),
        };
        match std::env::var(name) {
            Ok(value) => Ok(value),
            Err(_) => {
                let default = default.map(|d| d.to_string()).ok_or_else(|| {
                    ArchiverError::configuration(format!(
                        "environment variable '{name}' is not set and no default was given"
                    ))
                })?;
                if !path.is_empty() {
                    self.attribution.insert(path.to_string(), ConfigSource::EnvDefault);
                }
                Ok(default)
            }
        }
    }

    /// Walk every string scalar in the document, substituting in place.
    fn substitute_value(&mut self, value: &serde_yaml::Value, path: &str) -> Result<serde_yaml::Value, ArchiverError> {
        match value {
            serde_yaml::Value::String(s) => {
                if !path.is_empty() {
                    self.attribution.entry(path.to_string()).or_insert(ConfigSource::File);
                }
                Ok(serde_yaml::Value::String(self.substitute_str(s, path)?))
            }
            serde_yaml::Value::Mapping(map) => {
                let mut out = serde_yaml::Mapping::new();
                for (k, v) in map {
                    let key_str = k.as_str().map(str::to_string);
                    let child_path = match (&key_str, path.is_empty()) {
                        (Some(k), true) => k.clone(),
                        (Some(k), false) => format!("{path}.{k}"),
                        (None, _) => path.to_string(),
                    };
                    out.insert(k.clone(), self.substitute_value(v, &child_path)?);
                }
                Ok(serde_yaml::Value::Mapping(out))
            }
            serde_yaml::Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.substitute_value(item, path)?);
                }
                Ok(serde_yaml::Value::Sequence(out))
            }
            other => Ok(other.clone()),
        }
    }
}

fn lookup_path<'a>(root: &'a serde_yaml::Value, path: &str) -> Option<&'a serde_yaml::Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_mapping()?.get(serde_yaml::Value::String(segment.to_string()))?;
    }
    Some(current)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Substitute every `${...}` placeholder in `raw`, returning the resolved
/// document as a `serde_yaml::Value` ready for typed deserialization.
pub fn substitute(raw: &serde_yaml::Value) -> Result<serde_yaml::Value, ArchiverError> {
    substitute_with_attribution(raw).map(|(value, _)| value)
}

/// Same as [`substitute`], additionally returning where each leaf scalar's
/// final value came from.
pub fn substitute_with_attribution(
    raw: &serde_yaml::Value,
) -> Result<(serde_yaml::Value, Attribution), ArchiverError> {
    let mut resolver = Resolver::new(raw);
    let resolved = resolver.substitute_value(raw, "")?;
    Ok((resolved, resolver.attribution))
}
