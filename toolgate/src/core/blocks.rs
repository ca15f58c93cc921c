//! Heuristic block extraction for schema introspection.
//!
//! Both scanners are plain counter-driven passes over the text. They do not
//! understand string literals or comments, so a `;` or brace inside either can
//! cut a block short or run it long. That approximation is accepted: the
//! output is context for a reader, not a parse tree.

use super::text::{floor_char_boundary, truncate_bytes};

/// Bounds for a terminator scan.
#[derive(Debug, Clone, Copy)]
pub struct TerminatorScan {
    /// How far past the match to look for the terminator.
    pub window: usize,
    /// Slice length used when no terminator is found inside the window.
    pub fallback: usize,
}

/// SQL statements end at `;`.
pub const SQL_STATEMENT: TerminatorScan = TerminatorScan {
    window: 8_000,
    fallback: 2_000,
};

/// Bounds for a balanced-brace scan.
#[derive(Debug, Clone, Copy)]
pub struct BraceScan {
    /// How far past the match the counter may run before giving up.
    pub window: usize,
    /// Cap on the returned block.
    pub max_len: usize,
}

pub const TYPE_DEFINITION: BraceScan = BraceScan {
    window: 3_000,
    max_len: 2_000,
};

/// Byte offset of the first character on the line containing `offset`.
pub fn line_start(content: &str, offset: usize) -> usize {
    content[..offset].rfind('\n').map_or(0, |idx| idx + 1)
}

/// 1-based line number of `offset`.
pub fn line_number_at(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

/// Text from `start` through the next `terminator` (inclusive).
///
/// Falls back to a fixed-length slice when the terminator does not appear
/// within `scan.window` bytes. `start` must be a char boundary.
pub fn terminated_block(content: &str, start: usize, terminator: char, scan: TerminatorScan) -> &str {
    let window_end = floor_char_boundary(content, start.saturating_add(scan.window));
    match content[start..window_end].find(terminator) {
        Some(offset) => &content[start..start + offset + terminator.len_utf8()],
        None => {
            let end = floor_char_boundary(content, start.saturating_add(scan.fallback));
            &content[start..end]
        }
    }
}

/// Text from the start of the line holding `match_start` to the brace that
/// closes the first `{` opened at or after the match.
///
/// A `;` seen before any `{` ends the block (brace-less aliases such as
/// `type Id = string;`). If the counter never returns to zero the block runs to
/// the end of the scan window. The result is capped at `scan.max_len` bytes.
pub fn balanced_block(content: &str, match_start: usize, scan: BraceScan) -> &str {
    let begin = line_start(content, match_start);
    let window_end = floor_char_boundary(content, match_start.saturating_add(scan.window));

    let mut depth = 0usize;
    let mut opened = false;
    let mut end = window_end;
    for (offset, ch) in content[match_start..window_end].char_indices() {
        match ch {
            '{' => {
                depth += 1;
                opened = true;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    end = match_start + offset + 1;
                    break;
                }
            }
            ';' if !opened => {
                end = match_start + offset + 1;
                break;
            }
            _ => {}
        }
    }

    truncate_bytes(&content[begin..end], scan.max_len).0
}
