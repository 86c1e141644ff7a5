//! Whitespace normalization and the final noise-stripping pass.

use regex::Regex;
use std::sync::OnceLock;

struct NoisePatterns {
    bracket_tag: Regex,
    iso_stamp: Regex,
    slash_stamp: Regex,
    clock_time: Regex,
    hash_token: Regex,
    symbols: Regex,
    spaces: Regex,
}

fn noise() -> &'static NoisePatterns {
    static PATTERNS: OnceLock<NoisePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| NoisePatterns {
        bracket_tag: Regex::new(r"\[[^\]\n]*\]").expect("bracket pattern"),
        // 2024-03-01 12:34[:56][.789][Z]
        iso_stamp: Regex::new(r"\b\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2})?(\.\d+)?Z?")
            .expect("iso stamp pattern"),
        // 3/1/2024, 12:34[:56] [PM]
        slash_stamp: Regex::new(
            r"\b\d{1,2}/\d{1,2}/\d{2,4},?\s+\d{1,2}:\d{2}(:\d{2})?(\s?[AaPp][Mm])?",
        )
        .expect("slash stamp pattern"),
        clock_time: Regex::new(r"\b\d{1,2}:\d{2}(:\d{2})?\s?[AaPp][Mm]\b").expect("clock pattern"),
        hash_token: Regex::new(r"\b[A-Z0-9]{12,}\b").expect("hash pattern"),
        symbols: Regex::new(
            r"[\x{1F000}-\x{1FAFF}\x{2600}-\x{27BF}\x{2B00}-\x{2BFF}\x{FE0F}\x{200D}]",
        )
        .expect("symbol pattern"),
        spaces: Regex::new(r"[ \t]+").expect("space pattern"),
    })
}

/// Normalize line endings, drop non-printable characters, squeeze
/// horizontal whitespace and trim each line. Newlines are kept.
pub fn normalize(text: &str) -> String {
    let printable: String = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .filter(|c| !matches!(c, '\u{200B}' | '\u{FEFF}'))
        .collect();
    collapse_whitespace(&printable)
}

/// Squeeze runs of spaces/tabs, trim lines and drop blank ones.
pub fn collapse_whitespace(text: &str) -> String {
    let spaces = &noise().spaces;
    text.lines()
        .map(|line| spaces.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip bracketed tags, date-time stamps, hash-like tokens and
/// emoji/symbols, then collapse whitespace.
pub fn strip_noise(text: &str) -> String {
    let p = noise();
    let text = p.bracket_tag.replace_all(text, " ");
    let text = p.iso_stamp.replace_all(&text, " ");
    let text = p.slash_stamp.replace_all(&text, " ");
    let text = p.clock_time.replace_all(&text, " ");
    // All-caps words are fine; only tokens mixing in digits look like hashes.
    let text = p.hash_token.replace_all(&text, |caps: &regex::Captures| {
        let token = &caps[0];
        if token.chars().any(|c| c.is_ascii_digit()) {
            String::new()
        } else {
            token.to_string()
        }
    });
    let text = p.symbols.replace_all(&text, "");
    collapse_whitespace(&text)
}
