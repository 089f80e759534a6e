//! Language-model generator seam.
//!
//! Everything non-scripted flows through this trait: free-form replies and
//! the single boolean classification that gates the reveal moment. Provider
//! failures must never escape into the engines, so callers go through the
//! `*_or_fallback` helpers, which substitute fixed text and log instead.

use anyhow::Result;
use async_trait::async_trait;

/// Substituted whenever the generator fails or times out. The turn's
/// stage/node transition proceeds as if this had been generated.
pub const FALLBACK_REPLY: &str =
    "Sorry, I lost my train of thought for a second there. Tell me more?";

#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a free-form reply. `context` carries persona description and
    /// any conversation framing; `prompt` is the immediate instruction.
    async fn generate(&self, prompt: &str, context: &str) -> Result<String>;

    /// One-bit classification, e.g. "is this a good moment for the reveal".
    async fn classify_boolean(&self, prompt: &str) -> Result<bool>;
}

/// Generate, degrading to [`FALLBACK_REPLY`] on any provider error.
pub async fn generate_or_fallback(generator: &dyn Generator, prompt: &str, context: &str) -> String {
    match generator.generate(prompt, context).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            tracing::warn!("Generator returned empty text, using fallback");
            FALLBACK_REPLY.to_string()
        }
        Err(e) => {
            tracing::warn!("Generator call failed (non-fatal): {}", e);
            FALLBACK_REPLY.to_string()
        }
    }
}

/// Classify, degrading to `false` (the conservative answer: no reveal) on
/// provider error.
pub async fn classify_or_false(generator: &dyn Generator, prompt: &str) -> bool {
    match generator.classify_boolean(prompt).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!("Boolean classification failed (non-fatal): {}", e);
            false
        }
    }
}
