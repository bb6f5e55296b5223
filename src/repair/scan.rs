//! Text transforms used by the recovery strategies.
//!
//! All of these are pure `&str -> String` functions. The ones that care about
//! string literals track double-quoted JSON strings (with backslash escapes)
//! so they never touch text inside a value unless that is their purpose.

use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```[a-z0-9_+-]*[ \t]*\r?\n?").expect("valid fence pattern"));
static TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*```\s*$").expect("valid fence pattern"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Remove a surrounding markdown code fence, if present.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let start = LEADING_FENCE
        .find(trimmed)
        .map(|m| m.end())
        .unwrap_or(0);
    let body = &trimmed[start..];
    let end = TRAILING_FENCE
        .find(body)
        .map(|m| m.start())
        .unwrap_or(body.len());
    body[..end].trim()
}

/// Substring from the first `[` to the last `]`, or from the first `[` to the
/// end when the closing bracket is missing. Falls back to the whole text.
pub fn array_region(text: &str) -> &str {
    match text.find('[') {
        Some(start) => match text.rfind(']') {
            Some(end) if end > start => &text[start..=end],
            _ => &text[start..],
        },
        None => text,
    }
}

/// Drop ASCII control characters other than tab, line feed and carriage return.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| !matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}'))
        .collect()
}

/// Escape raw line breaks and tabs that occur inside double-quoted strings.
/// Text outside strings is left alone.
pub fn escape_breaks_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Remove commas that directly precede a closing `]` or `}` (ignoring
/// whitespace), outside of strings.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Collapse every whitespace run to a single space, strings included.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// Outermost balanced `{...}` substrings, in order. Braces inside strings
/// do not count. A `{` that never closes does not hide the complete objects
/// after it, so records inside a truncated wrapper or after a stray brace in
/// prose are still found. An object still open at the end of input is dropped.
pub fn balanced_objects(text: &str) -> Vec<&str> {
    let mut open: Vec<usize> = Vec::new();
    let mut closed: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(i),
            '}' => {
                if let Some(start) = open.pop() {
                    closed.push((start, i));
                }
            }
            _ => {}
        }
    }

    // Spans nest or are disjoint; keep the ones no other span contains.
    closed.sort_unstable_by_key(|&(start, _)| start);
    let mut objects = Vec::new();
    let mut covered_until = None;
    for (start, end) in closed {
        if covered_until.map_or(false, |until| start < until) {
            continue;
        }
        objects.push(&text[start..=end]);
        covered_until = Some(end);
    }
    objects
}
