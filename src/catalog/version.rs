//! Version ordering for model identifiers.
//!
//! `gemini-2.5-pro-002` yields `[2, 5, 2]`: the first short dotted-number
//! token is the version, later all-digit tokens are revisions. Identifiers
//! without a version token produce an empty key and sort last.

use std::cmp::Ordering;

pub fn version_key(model_id: &str) -> Vec<u32> {
    let mut key = Vec::new();
    let mut seen_version = false;
    for token in model_id.split(['-', '_']) {
        if !seen_version {
            if is_version_token(token) {
                key.extend(token.split('.').filter_map(|n| n.parse::<u32>().ok()));
                seen_version = true;
            }
        } else if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(rev) = token.parse::<u32>() {
                key.push(rev);
            }
        }
    }
    key
}

fn is_version_token(token: &str) -> bool {
    let mut parts = token.split('.');
    let Some(major) = parts.next() else {
        return false;
    };
    if major.is_empty() || major.len() > 2 || !major.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Newer versions first.
pub fn compare_newest_first(a: &str, b: &str) -> Ordering {
    version_key(b).cmp(&version_key(a))
}
