//! Text shaping helpers for tool output: rules, line numbering, byte caps.

/// Horizontal rule used under tool headers.
pub fn rule(width: usize) -> String {
    "-".repeat(width)
}

/// Heavier rule used between a header and a file body.
pub fn heavy_rule(width: usize) -> String {
    "=".repeat(width)
}

/// Largest index `<= idx` that lies on a char boundary of `s`.
pub fn floor_char_boundary(s: &str, idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    let mut idx = idx;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Cut `s` to at most `max_bytes`, never splitting a UTF-8 sequence.
///
/// Returns the kept prefix and the number of bytes dropped.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> (&str, usize) {
    let end = floor_char_boundary(s, max_bytes);
    (&s[..end], s.len() - end)
}

/// Line count reported after a write: newline count + 1.
pub fn written_line_count(content: &str) -> usize {
    content.matches('\n').count() + 1
}

/// Render `lines` with fixed-width 1-based line numbers (`   7 | text`).
pub fn number_lines<'a, I>(lines: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .enumerate()
        .map(|(idx, line)| format!("{:>4} | {}", idx + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
