//! Char-boundary-safe text helpers.
//!
//! Budgets throughout the engine are expressed in characters, not bytes,
//! so a cap never splits a multi-byte code point.

/// Number of characters in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Longest prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate `s` to `max_chars` characters, appending `suffix` when anything
/// was cut. The suffix is not counted against the budget.
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    let head = truncate_chars(s, max_chars);
    if head.len() == s.len() {
        s.to_owned()
    } else {
        format!("{head}{suffix}")
    }
}
