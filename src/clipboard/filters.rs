//! Highlight filters and the dedupe ledger shared with prompt dispatch.
//!
//! A clipboard value becomes a highlight only if it is new, has not been
//! emitted before, and survives three exclusions in order: it was just
//! submitted by us, it looks like a short typed query, or it is a block
//! of one-object-per-line structured log output.

use crate::config::ClipboardPolicy;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardVerdict {
    Accept,
    Empty,
    /// Same as the last observed value.
    Unchanged,
    AlreadySent,
    /// Matches a prompt this process submitted within the TTL.
    SelfSubmitted,
    ShortPlainText,
    StructuredLog,
}

/// Single line and under `max_chars` characters; presumed to be a typed query.
pub fn is_short_plain_text(text: &str, max_chars: usize) -> bool {
    let trimmed = text.trim();
    !trimmed.contains('\n') && trimmed.chars().count() < max_chars
}

/// Every non-blank line, trimmed, starts with `{` and ends with `}`.
pub fn is_structured_log(text: &str) -> bool {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    lines.peek().is_some() && lines.all(|l| l.starts_with('{') && l.ends_with('}'))
}

/// Most highlights remembered as already sent; the oldest is forgotten first.
pub const SENT_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct ClipboardLedger {
    policy: ClipboardPolicy,
    last_seen: Option<String>,
    sent: HashSet<String>,
    sent_order: VecDeque<String>,
    /// Trimmed prompts with the instant they were submitted.
    submissions: Vec<(String, Instant)>,
}

impl ClipboardLedger {
    pub fn new(policy: ClipboardPolicy) -> Self {
        Self {
            policy,
            last_seen: None,
            sent: HashSet::new(),
            sent_order: VecDeque::new(),
            submissions: Vec::new(),
        }
    }

    pub fn policy(&self) -> &ClipboardPolicy {
        &self.policy
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.policy.self_submission_ttl_secs)
    }

    /// Remember a prompt we are about to submit.
    pub fn record_submission(&mut self, prompt: &str, now: Instant) {
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return;
        }
        self.prune(now);
        self.submissions.push((trimmed.to_string(), now));
    }

    /// Drop submission records older than the TTL.
    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl();
        self.submissions
            .retain(|(_, at)| now.saturating_duration_since(*at) <= ttl);
    }

    fn recently_submitted(&self, trimmed: &str, now: Instant) -> bool {
        let ttl = self.ttl();
        self.submissions
            .iter()
            .any(|(p, at)| p == trimmed && now.saturating_duration_since(*at) <= ttl)
    }

    /// Judge a clipboard value. Records it as the last observed value.
    pub fn classify(&mut self, candidate: &str, now: Instant) -> ClipboardVerdict {
        if self.last_seen.as_deref() == Some(candidate) {
            return ClipboardVerdict::Unchanged;
        }
        self.last_seen = Some(candidate.to_string());

        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return ClipboardVerdict::Empty;
        }
        if self.sent.contains(candidate) {
            return ClipboardVerdict::AlreadySent;
        }
        if self.recently_submitted(trimmed, now) {
            return ClipboardVerdict::SelfSubmitted;
        }
        if is_short_plain_text(candidate, self.policy.short_text_max_chars) {
            return ClipboardVerdict::ShortPlainText;
        }
        if is_structured_log(candidate) {
            return ClipboardVerdict::StructuredLog;
        }
        ClipboardVerdict::Accept
    }

    pub fn mark_sent(&mut self, text: &str) {
        if !self.sent.insert(text.to_string()) {
            return;
        }
        self.sent_order.push_back(text.to_string());
        while self.sent_order.len() > SENT_CAPACITY {
            if let Some(oldest) = self.sent_order.pop_front() {
                self.sent.remove(&oldest);
            }
        }
    }

    /// Classify and, on acceptance, record as sent. Returns the highlight.
    pub fn observe(&mut self, candidate: &str, now: Instant) -> Option<String> {
        match self.classify(candidate, now) {
            ClipboardVerdict::Accept => {
                self.mark_sent(candidate);
                Some(candidate.to_string())
            }
            verdict => {
                log::debug!("[CLIPBOARD] Skipped: {:?}", verdict);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str = "line one of a longer selection\nline two with more context\nline three";

    fn ledger() -> ClipboardLedger {
        ClipboardLedger::new(ClipboardPolicy::default())
    }

    #[test]
    fn self_submission_rejected_within_ttl_accepted_after() {
        let t0 = Instant::now();
        let mut l = ledger();
        l.record_submission(&format!("  {}  ", LONG), t0);

        assert_eq!(
            l.classify(LONG, t0 + Duration::from_secs(10)),
            ClipboardVerdict::SelfSubmitted
        );

        // A different value in between so the next one isn't "unchanged".
        l.classify("x", t0 + Duration::from_secs(11));
        assert_eq!(
            l.classify(LONG, t0 + Duration::from_secs(61)),
            ClipboardVerdict::Accept
        );
    }

    #[test]
    fn short_single_line_is_rejected() {
        let mut l = ledger();
        assert_eq!(
            l.classify("how do I fix this", Instant::now()),
            ClipboardVerdict::ShortPlainText
        );
        let long_line = "a".repeat(200);
        assert_eq!(l.classify(&long_line, Instant::now()), ClipboardVerdict::Accept);
    }

    #[test]
    fn structured_log_is_rejected() {
        let log = "{\"level\":\"info\",\"msg\":\"started\"}\n\n  {\"level\":\"warn\",\"msg\":\"slow\"}  \n";
        assert!(is_structured_log(log));
        assert_eq!(ledger().classify(log, Instant::now()), ClipboardVerdict::StructuredLog);
        assert!(!is_structured_log("{\"a\":1}\nplain text"));
        assert!(!is_structured_log("   \n  "));
    }

    #[test]
    fn unchanged_and_already_sent() {
        let now = Instant::now();
        let mut l = ledger();
        assert_eq!(l.observe(LONG, now), Some(LONG.to_string()));
        assert_eq!(l.classify(LONG, now), ClipboardVerdict::Unchanged);
        l.classify("something else", now);
        assert_eq!(l.classify(LONG, now), ClipboardVerdict::AlreadySent);
    }

    #[test]
    fn blank_is_empty() {
        assert_eq!(ledger().classify(" \n\t", Instant::now()), ClipboardVerdict::Empty);
    }

    #[test]
    fn sent_set_forgets_oldest_beyond_capacity() {
        let mut l = ledger();
        for i in 0..=SENT_CAPACITY {
            l.mark_sent(&format!("highlight {i}"));
        }
        assert_eq!(l.sent.len(), SENT_CAPACITY);
        assert_eq!(l.sent_order.len(), SENT_CAPACITY);
        assert!(!l.sent.contains("highlight 0"));
        assert!(l.sent.contains(&format!("highlight {SENT_CAPACITY}")));

        // Re-marking a remembered value does not grow the ledger.
        l.mark_sent("highlight 1");
        assert_eq!(l.sent_order.len(), SENT_CAPACITY);
    }

    #[test]
    fn prune_drops_expired_records() {
        let t0 = Instant::now();
        let mut l = ledger();
        l.record_submission("old prompt", t0);
        l.prune(t0 + Duration::from_secs(120));
        assert!(l.submissions.is_empty());
    }
}
