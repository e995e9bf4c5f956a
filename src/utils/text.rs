// src/utils/text.rs

use std::sync::OnceLock;

use regex::Regex;

/// Assumed reading speed for the reading-time estimate.
const WORDS_PER_MINUTE: f64 = 225.0;

fn non_slug_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s-]").unwrap())
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Derives a URL-friendly slug from a post title.
///
/// Lowercases the title, strips everything outside `[a-z0-9 -]`, collapses
/// whitespace runs to single hyphens and trims hyphens from both ends.
/// The result can be empty for an all-punctuation title; callers are
/// expected to substitute a fallback base before relying on it.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = non_slug_chars().replace_all(&lowered, "");
    let hyphenated = whitespace_runs().replace_all(stripped.trim(), "-");
    hyphenated.trim_matches('-').to_string()
}

/// Estimates reading time in minutes from whitespace-delimited word count.
/// Always at least 1 minute.
pub fn reading_time(content: &str) -> i64 {
    let words = content.split_whitespace().count();
    ((words as f64 / WORDS_PER_MINUTE).round() as i64).max(1)
}
