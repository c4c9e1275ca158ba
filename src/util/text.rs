/// Truncates a string to at most `max_chars` characters, appending `marker`
/// when anything was cut off.
///
/// Operates on `char` boundaries, so multibyte input (CJK, emoji) never
/// produces a panic or a broken code point. The marker is appended on top
/// of the prefix rather than counted against it, matching the
/// `text[:N] + "..."` shape of excerpt fallbacks.
///
/// # Examples
///
/// ```
/// use newswire::util::truncate_chars;
///
/// assert_eq!(truncate_chars("short", 10, "..."), "short");
/// assert_eq!(truncate_chars("abcdef", 3, "..."), "abc...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize, marker: &str) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + marker.len());
            out.push_str(&s[..byte_idx]);
            out.push_str(marker);
            out
        }
    }
}
