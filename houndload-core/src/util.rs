//! Utility functions for houndload

/// Safely truncates a string to a maximum number of characters.
///
/// Respects utf8 character boundaries.
pub fn safe_truncate_utf8(s: impl AsRef<str>, max_chars: usize) -> String {
    s.as_ref().chars().take(max_chars).collect()
}

/// Debug print a long string by truncating to n characters
///
/// Statements are logged through this so a failing upload does not flood the log.
///
/// # Example
///
/// ```
/// # use houndload_core::util::debug_long_utf8;
/// let s = debug_long_utf8("MATCH (n) RETURN n", 5);
///
/// assert_eq!(s, "MATCH (18)");
/// ```
pub fn debug_long_utf8(s: impl AsRef<str>, max_chars: usize) -> String {
    let trunc = safe_truncate_utf8(&s, max_chars);

    format!("{} ({})", trunc, s.as_ref().chars().count())
}

/// Collapses runs of whitespace so multi-line statements log on a single line
pub fn single_line(s: impl AsRef<str>) -> String {
    s.as_ref().split_whitespace().collect::<Vec<_>>().join(" ")
}
