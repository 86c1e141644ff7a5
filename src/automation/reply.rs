//! Classifying the user's answer to a pending question.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Drop the paused automation and treat the text as a new prompt.
    Abort,
    /// Move past the failed step.
    Skip,
    /// Anything else: becomes the recovery suggestion for a replan.
    Answer(String),
}

fn abort_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(abort|cancel|stop|no|nevermind|never mind|quit)\b")
            .expect("abort pattern is valid")
    })
}

fn skip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(skip|move on)\b")
            .expect("skip pattern is valid")
    })
}

/// Map a numeric reply to the n-th option (1-based). Anything else, or an
/// out-of-range number, is returned trimmed as typed.
pub fn resolve_option(reply: &str, options: &[String]) -> String {
    let trimmed = reply.trim();
    match trimmed.parse::<usize>() {
        Ok(n) if n >= 1 && n <= options.len() => options[n - 1].clone(),
        _ => trimmed.to_string(),
    }
}

pub fn classify(reply: &str, options: &[String]) -> Reply {
    if abort_re().is_match(reply) {
        Reply::Abort
    } else if skip_re().is_match(reply) {
        Reply::Skip
    } else {
        Reply::Answer(resolve_option(reply, options))
    }
}
