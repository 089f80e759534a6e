//! Persistence gateway for narrative state and memory fragments.
//!
//! The trait is the seam the orchestrator programs against; state rows are
//! keyed by (user_id, agent_id) and fragments are append-only. The in-memory
//! implementation backs tests and ephemeral runs.

use crate::fragment::MemoryFragment;
use anyhow::Result;
use async_trait::async_trait;
use reverie_core::state::NarrativeState;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait NarrativeStore: Send + Sync {
    /// Load the persisted state for a pair, `None` on first contact.
    async fn load_narrative_state(
        &self,
        user_id: &str,
        agent_id: &str,
    ) -> Result<Option<NarrativeState>>;

    /// Upsert the state for a pair. Last write wins; concurrent turns for
    /// the same pair are not coordinated.
    async fn save_narrative_state(
        &self,
        user_id: &str,
        agent_id: &str,
        state: &NarrativeState,
    ) -> Result<()>;

    /// Append a memory fragment, returning its id.
    async fn create_memory_fragment(&self, fragment: &MemoryFragment) -> Result<Uuid>;
}

/// Map-backed store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    states: RwLock<HashMap<(String, String), NarrativeState>>,
    fragments: RwLock<Vec<MemoryFragment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored fragments, oldest first.
    pub async fn fragments(&self) -> Vec<MemoryFragment> {
        self.fragments.read().await.clone()
    }
}

#[async_trait]
impl NarrativeStore for InMemoryStore {
    async fn load_narrative_state(
        &self,
        user_id: &str,
        agent_id: &str,
    ) -> Result<Option<NarrativeState>> {
        let states = self.states.read().await;
        Ok(states
            .get(&(user_id.to_string(), agent_id.to_string()))
            .cloned())
    }

    async fn save_narrative_state(
        &self,
        user_id: &str,
        agent_id: &str,
        state: &NarrativeState,
    ) -> Result<()> {
        let mut states = self.states.write().await;
        states.insert((user_id.to_string(), agent_id.to_string()), state.clone());
        Ok(())
    }

    async fn create_memory_fragment(&self, fragment: &MemoryFragment) -> Result<Uuid> {
        let mut fragments = self.fragments.write().await;
        fragments.push(fragment.clone());
        Ok(fragment.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_core::state::IntroStage;

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let store = InMemoryStore::new();
        assert!(store
            .load_narrative_state("u1", "harbor-host")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let store = InMemoryStore::new();
        let mut state = NarrativeState::default();
        state.intro_stage = IntroStage::RevealCapabilities;
        state.user_name = Some("Sam".to_string());

        store
            .save_narrative_state("u1", "harbor-host", &state)
            .await
            .unwrap();
        let loaded = store
            .load_narrative_state("u1", "harbor-host")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, state);

        // Different agent id is a different row
        assert!(store
            .load_narrative_state("u1", "ember-chef")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_fragments_append() {
        let store = InMemoryStore::new();
        let f = MemoryFragment::from_exchange("u1", "a moment worth keeping", 0.8);
        let id = store.create_memory_fragment(&f).await.unwrap();
        assert_eq!(id, f.id);
        assert_eq!(store.fragments().await.len(), 1);
    }
}
