//! Mock generator — deterministic responses for tests and offline runs.

use crate::generator::Generator;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct MockGenerator {
    reply: String,
    boolean_answer: bool,
    fail: bool,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            boolean_answer: false,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fixed answer for `classify_boolean`.
    pub fn with_boolean(mut self, answer: bool) -> Self {
        self.boolean_answer = answer;
        self
    }

    /// Every call errors, for exercising fallback paths.
    pub fn failing() -> Self {
        Self {
            reply: String::new(),
            boolean_answer: false,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, _prompt: &str, _context: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("mock generator configured to fail");
        }
        Ok(self.reply.clone())
    }

    async fn classify_boolean(&self, _prompt: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("mock generator configured to fail");
        }
        Ok(self.boolean_answer)
    }
}
