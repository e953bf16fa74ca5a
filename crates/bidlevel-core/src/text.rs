//! Text normalisation helpers shared by the extractor and reconciler.

use std::sync::LazyLock;

use regex::Regex;

static DOLLAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\(\s*)?(-\s*)?\$\s*(\d[\d,]*(?:\.\d+)?)(\s*\))?").expect("valid regex")
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\(\s*)?(-\s*)?(\d[\d,]*(?:\.\d+)?)(\s*\))?").expect("valid regex"));

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase the first character, leave the rest untouched.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}

/// Case-insensitive comparison key: lowercase, collapsed whitespace, no edge punctuation.
pub fn normalize_key(s: &str) -> String {
    collapse_whitespace(&s.to_lowercase())
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Parse a money-ish value.
///
/// `$4,200`, `4200.00`, `-$4,200` and `(4,200)` are all understood; parenthesised or
/// minus-prefixed amounts are negative. A `$` amount wins over bare numbers, so
/// `Alt 2: $500` parses as 500.
pub fn parse_money(s: &str) -> Option<f64> {
    let caps = DOLLAR_RE.captures(s).or_else(|| NUMBER_RE.captures(s))?;
    let digits: String = caps[3].chars().filter(|c| *c != ',').collect();
    let value: f64 = digits.parse().ok()?;
    let parenthesised = caps.get(1).is_some() && caps.get(4).is_some();
    let negative = parenthesised || caps.get(2).is_some();
    Some(if negative { -value } else { value })
}

/// First `$` amount in a line, unsigned. Bare numbers are ignored.
pub fn find_dollar_amount(s: &str) -> Option<f64> {
    let caps = DOLLAR_RE.captures(s)?;
    let digits: String = caps[3].chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

/// Remove every `$` amount from a line.
pub fn strip_dollar_amounts(s: &str) -> String {
    collapse_whitespace(&DOLLAR_RE.replace_all(s, " "))
}

/// Split a comma-delimited row, honouring double-quoted cells.
///
/// Thousands separators (`12,000`) stay inside their cell.
pub fn split_delimited(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' if in_quotes && chars.get(i + 1) == Some(&'"') => {
                current.push('"');
                i += 1;
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes && is_thousands_separator(&chars, i) => current.push(','),
            ',' | '\t' | '|' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
        i += 1;
    }
    cells.push(current.trim().to_string());
    cells
}

fn is_thousands_separator(chars: &[char], comma: usize) -> bool {
    let digit_before = comma > 0 && chars[comma - 1].is_ascii_digit();
    let three_after = (1..=3).all(|k| chars.get(comma + k).is_some_and(|c| c.is_ascii_digit()));
    let fourth_not_digit = !chars.get(comma + 4).is_some_and(|c| c.is_ascii_digit());
    digit_before && three_after && fourth_not_digit
}

/// Render cells as one CSV row, quoting where needed.
pub fn join_csv_row<S: AsRef<str>>(cells: &[S]) -> String {
    cells
        .iter()
        .map(|c| {
            let c = c.as_ref();
            if c.contains([',', '"', '\n']) {
                format!("\"{}\"", c.replace('"', "\"\""))
            } else {
                c.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
