//! File-name extraction from recognized screen text.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Longest accepted file name, in characters.
pub const MAX_FILENAME_LEN: usize = 255;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

fn candidate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Anchored on a letter-led extension of 1-10 alphanumerics.
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_][A-Za-z0-9_.\-]*\.[A-Za-z][A-Za-z0-9]{0,9}\b")
            .expect("file-name pattern is valid")
    })
}

fn extension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\.[A-Za-z0-9]{1,10}$").expect("extension pattern is valid")
    })
}

/// Does this look like a usable file name?
pub fn is_valid_filename(name: &str) -> bool {
    if name.is_empty() || name.chars().count() > MAX_FILENAME_LEN {
        return false;
    }
    if name.chars().any(|c| c.is_control() || FORBIDDEN.contains(&c)) {
        return false;
    }
    if name.starts_with('.') || name.ends_with('.') || name.trim() != name {
        return false;
    }
    extension_re().is_match(name)
}

/// At least two characters before the extension dot. Rejects
/// abbreviations like `e.g.` and `i.e.`.
fn has_stem(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, _)| stem.chars().count() >= 2)
}

/// Candidate file names, deduplicated case-insensitively (first casing
/// wins) and validated.
pub fn extract_filenames(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    candidate_re()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches('.'))
        .filter(|name| has_stem(name) && is_valid_filename(name))
        .filter(|name| seen.insert(name.to_lowercase()))
        .map(|name| name.to_string())
        .collect()
}
