//! Shared line-level rules used by every converter: key normalization,
//! value quoting, and the scalar-vs-array decision.

/// Replace the characters that can't appear in a FHiCL identifier with
/// underscores: spaces, hyphens, parentheses, slashes, dots.
pub fn normalize_key(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            ' ' | '-' | '(' | ')' | '/' | '.' => '_',
            other => other,
        })
        .collect()
}

/// Replace any non-ASCII byte with `.`, matching the blob's UTF-8-only
/// contract for source text that may carry stray binary bytes.
pub fn ascii_sanitize(raw: &str) -> String {
    raw.chars().map(|c| if c.is_ascii() { c } else { '.' }).collect()
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.parse::<f64>().is_ok()
}

/// Strip one layer of surrounding double quotes, if present.
fn unquote(token: &str) -> &str {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

/// Render one value token as it should appear on the right-hand side of a
/// FHiCL assignment: numeric values unquoted, everything else quoted with
/// inner quotes escaped. An existing bracketed array token is passed
/// through verbatim.
pub fn format_value(raw: &str) -> String {
    let raw = ascii_sanitize(raw);
    if raw.starts_with('[') && raw.ends_with(']') {
        return raw;
    }
    if is_numeric(&raw) {
        return raw;
    }
    let inner = unquote(&raw);
    format!("\"{}\"", inner.replace('"', "\\\""))
}

/// Render a parsed `key value...` line as `key: value` (single value) or
/// `key: [value, value, ...]` (more than one value).
pub fn format_assignment(key: &str, values: &[&str]) -> String {
    let key = normalize_key(key);
    match values {
        [] => format!("{key}:"),
        [single] => format!("{key}: {}", format_value(single)),
        many => {
            let rendered: Vec<String> = many.iter().map(|v| format_value(v)).collect();
            format!("{key}: [{}]", rendered.join(", "))
        }
    }
}

/// Strip a trailing `# comment` from a line, respecting double-quoted
/// spans so a `#` inside a quoted value is not mistaken for one.
pub fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}
