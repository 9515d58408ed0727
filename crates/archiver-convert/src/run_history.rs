//! Derives a summary `RunHistory.fcl`/`RunHistory2.fcl` from raw metadata
//! text. The same function backs both artifacts — the import stage calls
//! it a second time, once the run's stop time has appeared, to produce
//! `RunHistory2.fcl`.

use crate::metadata::{extract_config_name, extract_run_times};
use crate::rules::format_assignment;

pub fn generate_run_history(metadata_text: &str, run_number: Option<u32>) -> String {
    let mut out = String::new();
    if let Some(run_number) = run_number {
        out.push_str(&format_assignment("run_number", &[&run_number.to_string()]));
        out.push('\n');
    }
    out.push_str(&format_assignment("config_name", &[&extract_config_name(metadata_text)]));
    out.push('\n');

    let (start, stop) = extract_run_times(metadata_text);
    if let Some(start) = &start {
        out.push_str(&format_assignment("start_time", &[start.as_str()]));
        out.push('\n');
    }
    if let Some(stop) = &stop {
        out.push_str(&format_assignment("stop_time", &[stop.as_str()]));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_run_number_when_given() {
        let out = generate_run_history("config_name test_run\n", Some(42));
        assert!(out.starts_with("run_number: 42\n"));
    }

    #[test]
    fn omits_stop_time_when_run_still_in_progress() {
        let out = generate_run_history("config_name test_run\nstart_time t0\n", None);
        assert!(out.contains("start_time"));
        assert!(!out.contains("stop_time"));
    }

    #[test]
    fn includes_stop_time_once_run_has_ended() {
        let out = generate_run_history("config_name test_run\nstart_time t0\nstop_time t1\n", None);
        assert!(out.contains("stop_time"));
    }

    #[test]
    fn deterministic_for_identical_input() {
        let meta = "config_name run_a\nstart_time t0\nstop_time t1\n";
        assert_eq!(generate_run_history(meta, Some(7)), generate_run_history(meta, Some(7)));
    }
}
