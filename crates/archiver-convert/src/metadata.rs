//! The `metadata` converter: colon-delimited `key: value` lines (keys may
//! contain embedded spaces, e.g. `DAQInterface start time`), plus
//! multi-line "logfile" sections (a bare `logfile` header line followed by
//! one entry per line, terminated by a blank line), plus the small set of
//! extraction helpers the import stage needs straight out of the raw
//! (pre-conversion) metadata text.

use crate::rules::{format_assignment, normalize_key, strip_comment};

pub fn convert_metadata(text: &str) -> String {
    let mut out = String::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let stripped = strip_comment(lines[i]).trim();
        if stripped.is_empty() {
            i += 1;
            continue;
        }
        if stripped.eq_ignore_ascii_case("logfile") {
            let mut entries = Vec::new();
            i += 1;
            while i < lines.len() {
                let entry = strip_comment(lines[i]).trim();
                if entry.is_empty() {
                    break;
                }
                entries.push(entry);
                i += 1;
            }
            let refs: Vec<&str> = entries.iter().copied().collect();
            out.push_str(&format_assignment("logfile", &refs));
            out.push('\n');
            continue;
        }

        let Some((key, value)) = split_key_value(stripped) else {
            i += 1;
            continue;
        };
        out.push_str(&format_assignment(key, &[value]));
        out.push('\n');
        i += 1;
    }
    out
}

/// Split a `key: value` line on its first colon. Returns `None` for lines
/// with no colon or an empty key.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(':')?;
    let key = line[..idx].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[idx + 1..].trim()))
}

/// Normalize a raw metadata key the same way `format_assignment` would
/// render it, for case/punctuation-insensitive field lookup.
fn canonical_key(raw: &str) -> String {
    normalize_key(raw).to_lowercase()
}

/// Extract `config_name` from raw (pre-conversion) metadata text, falling
/// back to `"standard"` when absent.
pub fn extract_config_name(text: &str) -> String {
    extract_field(text, "config_name").unwrap_or_else(|| "standard".to_string())
}

/// Extract the run's start and stop timestamps, if present, as raw
/// strings (format is whatever the source metadata used; callers compare
/// presence, not parse these further).
pub fn extract_run_times(text: &str) -> (Option<String>, Option<String>) {
    (extract_field(text, "start_time"), extract_field(text, "stop_time"))
}

/// Finds the first `key: value` line whose normalized key equals `target`
/// or ends with `_<target>`, so a multi-word key like
/// `DAQInterface start time` matches the target `start_time`.
fn extract_field(text: &str, target: &str) -> Option<String> {
    let suffix = format!("_{target}");
    for line in text.lines() {
        let stripped = strip_comment(line).trim();
        let Some((raw_key, raw_value)) = split_key_value(stripped) else { continue };
        let key = canonical_key(raw_key);
        if key == target || key.ends_with(&suffix) {
            if raw_value.is_empty() {
                return None;
            }
            return Some(raw_value.trim_matches('"').to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logfile_section_terminated_by_blank_line() {
        let input = "Config name: standard\nlogfile\nrun1.log\nrun2.log\n\nhost: localhost\n";
        let output = convert_metadata(input);
        assert!(output.contains("logfile: [\"run1.log\", \"run2.log\"]"));
        assert!(output.contains("host: \"localhost\""));
    }

    #[test]
    fn multi_word_key_is_normalized_in_output() {
        let input = "DAQInterface start time: 2024-01-01T00:00:00Z\n";
        assert_eq!(convert_metadata(input), "DAQInterface_start_time: \"2024-01-01T00:00:00Z\"\n");
    }

    #[test]
    fn extract_config_name_defaults_to_standard() {
        assert_eq!(extract_config_name("host: localhost\n"), "standard");
        assert_eq!(extract_config_name("Config name: physics_run\n"), "physics_run");
    }

    #[test]
    fn extract_run_times_reads_both_when_present() {
        let text = "DAQInterface start time: 2024-01-01T00:00:00Z\nDAQInterface stop time: 2024-01-01T01:00:00Z\n";
        let (start, stop) = extract_run_times(text);
        assert_eq!(start.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(stop.as_deref(), Some("2024-01-01T01:00:00Z"));
    }

    #[test]
    fn extract_run_times_stop_absent_when_run_in_progress() {
        let text = "DAQInterface start time: 2024-01-01T00:00:00Z\n";
        let (start, stop) = extract_run_times(text);
        assert!(start.is_some());
        assert!(stop.is_none());
    }

    #[test]
    fn same_metadata_converts_identically_every_time() {
        let input = "Config name: run_a\nlogfile\nx.log\n\n";
        assert_eq!(convert_metadata(input), convert_metadata(input));
    }
}
