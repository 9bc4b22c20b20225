//! Two-level document chunker.
//!
//! Splits a freeform document into ordered [`RawChunk`]s, one per candidate
//! post. Documents follow a fixed convention:
//!
//! - a line of three or more of one separator character (`###`, `___`,
//!   `===`, `***`, `~~~`, `---`) separates day/section groups;
//! - a line consisting solely of an em dash (`—`) separates posts within a
//!   section.
//!
//! Chunks are trimmed and empty chunks dropped. No content validation happens
//! here; that is the pre-validator's job.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::RawChunk;

/// Post delimiter within a section.
pub const POST_DELIMITER: &str = "—";

static RE_SECTION_DELIMITER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:#{3,}|={3,}|_{3,}|\*{3,}|~{3,}|-{3,})[ \t]*$").unwrap()
});

/// Whether `line` separates day/section groups.
pub fn is_section_delimiter(line: &str) -> bool {
    RE_SECTION_DELIMITER.is_match(line)
}

/// Whether `line` separates posts within a section.
pub fn is_post_delimiter(line: &str) -> bool {
    line.trim() == POST_DELIMITER
}

/// Split a document into ordered, trimmed, non-empty chunks.
/// Returns chunks with contiguous indices starting at 0.
pub fn chunk_document(document: &str) -> Vec<RawChunk> {
    let normalized = document.replace("\r\n", "\n").replace('\r', "\n");

    let mut chunks = Vec::new();
    for section in split_on_lines(&normalized, is_section_delimiter) {
        for piece in split_on_lines(&section, is_post_delimiter) {
            let trimmed = piece.trim();
            if trimmed.is_empty() {
                continue;
            }
            chunks.push(RawChunk {
                index: chunks.len(),
                text: trimmed.to_string(),
            });
        }
    }
    chunks
}

/// Split `text` into the runs of lines between delimiter lines.
fn split_on_lines(text: &str, is_delimiter: fn(&str) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if is_delimiter(line) {
            parts.push(current.join("\n"));
            current.clear();
        } else {
            current.push(line);
        }
    }
    parts.push(current.join("\n"));
    parts
}
