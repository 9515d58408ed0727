//! The line-based transform shared by every converter kind: strip
//! comments, skip blank lines, split each remaining line into a key and
//! its value tokens, and render a FHiCL assignment.

use crate::rules::{format_assignment, strip_comment};

/// Convert whitespace-delimited `key value...` lines into FHiCL
/// assignments. Deterministic: identical input bytes always produce
/// identical output bytes.
pub fn convert_lines(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let stripped = strip_comment(line).trim();
        if stripped.is_empty() {
            continue;
        }
        let mut tokens = stripped.split_whitespace();
        let Some(key) = tokens.next() else { continue };
        let values: Vec<&str> = tokens.collect();
        out.push_str(&format_assignment(key, &values));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_boardreaders_list_scenario() {
        let input = "tpc01 localhost -1\ntpc02 \"myexp-tpc02\" -1\n";
        let expected = "tpc01: [\"localhost\", \"-1\"]\ntpc02: [\"myexp-tpc02\", \"-1\"]\n";
        assert_eq!(convert_lines(input), expected);
    }

    #[test]
    fn blank_lines_and_comments_are_dropped() {
        let input = "# header comment\n\nhost localhost\n\n# trailing\n";
        assert_eq!(convert_lines(input), "host: \"localhost\"\n");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(convert_lines(""), "");
        assert_eq!(convert_lines("\n\n# only comments\n"), "");
    }

    #[test]
    fn same_input_converts_identically_every_time() {
        let input = "a 1\nb two\nc 1 2 3\n";
        assert_eq!(convert_lines(input), convert_lines(input));
    }
}
