//! Canonical publish-ready layout.
//!
//! [`format_post`] re-flows text line by line, tracking whether it is inside
//! a list and whether a blank line is pending:
//!
//! - consecutive list items are emitted with no blank line between them;
//! - a single blank line separates a list from the content before and after it;
//! - blank-separated prose paragraphs get exactly one blank line between them;
//! - blank runs collapse to one, and the output is trimmed.
//!
//! The delivery payload is this exact string, so the output must be
//! reproducible and `format_post(format_post(x)) == format_post(x)`.

use std::sync::LazyLock;

use regex::Regex;

/// Glyphs recognised as list-item markers when followed by whitespace.
pub const BULLET_GLYPHS: &[char] = &['•', '-', '*', '·', '▪', '◦', '‣'];

static RE_NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s").unwrap());

/// Whether a trimmed line starts a list item.
pub fn is_list_item(line: &str) -> bool {
    let mut chars = line.chars();
    if let (Some(first), Some(second)) = (chars.next(), chars.next()) {
        if BULLET_GLYPHS.contains(&first) && second.is_whitespace() {
            return true;
        }
    }
    RE_NUMBERED_ITEM.is_match(line)
}

/// Re-flow `content` into the canonical paragraph/list layout.
pub fn format_post(content: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_list = false;
    let mut pending_blank = false;

    for raw in content.split('\n') {
        let line = raw.trim();
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }

        if is_list_item(line) {
            if !in_list && !out.is_empty() {
                out.push("");
            }
            in_list = true;
        } else if in_list {
            out.push("");
            in_list = false;
        } else if pending_blank {
            out.push("");
        }

        out.push(line);
        pending_blank = false;
    }

    out.join("\n").trim().to_string()
}
