//! Heuristic classification of a single user utterance.
//!
//! Deterministic and stage-conditioned: the name check only applies at the
//! initial greeting, and the negative/minimal checks only apply at the three
//! gated stages. Everything else is substantive. In production this should
//! eventually be replaced with a learned classifier; the fixed phrase sets
//! here exist so the scripted introduction never advances past a stage whose
//! required information was not actually supplied.

use crate::state::IntroStage;
use regex::Regex;
use std::sync::LazyLock;

static RE_IM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bi'?m\s+([A-Za-z]+)").unwrap());
static RE_MY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmy\s+name\s+is\s+([A-Za-z]+)").unwrap());

/// Phrases that open a refusal or a blank. Checked against the trimmed,
/// lowercased start of the utterance.
const NEGATIVE_OPENERS: &[&str] = &[
    "no",
    "nope",
    "not really",
    "huh?",
    "i don't know",
    "i don't think so",
    "nothing comes to mind",
];

/// Exact-match whitelist of low-content replies.
const MINIMAL_REPLIES: &[&str] = &[
    "yes", "no", "maybe", "ok", "sure", "thanks", "thank you", "cool", "nice", "great",
    "awesome", "fine",
];

/// What kind of reply the user gave, relative to the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Looks like a self-introduction (initial greeting only).
    Name,
    /// Opens with a refusal phrase (gated stages only).
    Negative,
    /// Too short or whitelisted filler (gated stages only).
    Minimal,
    Substantive,
}

/// Stage-conditioned utterance classifier. Pure, no external calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseClassifier;

impl ResponseClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `text` as seen from `stage`.
    ///
    /// Check order matters: name before anything at the greeting, negative
    /// before minimal at the gated stages.
    pub fn classify(&self, stage: IntroStage, text: &str) -> ResponseKind {
        let trimmed = text.trim();

        if stage == IntroStage::InitialGreeting && looks_like_name(trimmed) {
            return ResponseKind::Name;
        }

        if stage.gated() {
            let lower = trimmed.to_lowercase();
            if NEGATIVE_OPENERS.iter().any(|p| lower.starts_with(p)) {
                return ResponseKind::Negative;
            }
            if trimmed.len() < 15 || MINIMAL_REPLIES.contains(&lower.as_str()) {
                return ResponseKind::Minimal;
            }
        }

        ResponseKind::Substantive
    }

    /// Pull a name out of a greeting-stage reply: the capture group of the
    /// "I'm X" / "my name is X" patterns, else the raw trimmed text.
    pub fn extract_name(&self, text: &str) -> String {
        let trimmed = text.trim();
        if let Some(caps) = RE_IM.captures(trimmed) {
            return caps[1].to_string();
        }
        if let Some(caps) = RE_MY_NAME.captures(trimmed) {
            return caps[1].to_string();
        }
        trimmed.to_string()
    }
}

fn looks_like_name(trimmed: &str) -> bool {
    trimmed.len() < 20 || RE_IM.is_match(trimmed) || RE_MY_NAME.is_match(trimmed)
}
