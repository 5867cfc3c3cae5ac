//! Small text helpers for post HTML.

use regex::Regex;
use std::sync::OnceLock;

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| {
        Regex::new(r"<[^>]+>").expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Remove HTML tags and trim surrounding whitespace.
pub fn strip_tags(html: &str) -> String {
    tag_regex().replace_all(html, "").trim().to_string()
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
