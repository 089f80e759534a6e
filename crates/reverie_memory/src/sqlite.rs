//! Sqlite-backed narrative store.
//!
//! State rows hold the serialized `NarrativeState` as JSON; schema changes
//! that add state fields need only serde defaults, not migrations. Fragments
//! are append-only.

use crate::fragment::MemoryFragment;
use crate::store::NarrativeStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reverie_core::state::NarrativeState;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS narrative_states (
                user_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, agent_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create narrative_states table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory_fragments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                record TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create memory_fragments table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_fragments_user ON memory_fragments(user_id)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create fragments user index")?;

        Ok(())
    }

    /// All fragments for a user, oldest first.
    pub async fn fragments_for_user(&self, user_id: &str) -> Result<Vec<MemoryFragment>> {
        let rows = sqlx::query(
            "SELECT record FROM memory_fragments WHERE user_id = ? ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch memory fragments")?;

        let mut fragments = Vec::with_capacity(rows.len());
        for row in rows {
            let record: String = row.get("record");
            fragments.push(
                serde_json::from_str(&record).context("Corrupt memory fragment record")?,
            );
        }
        Ok(fragments)
    }
}

#[async_trait]
impl NarrativeStore for SqliteStore {
    async fn load_narrative_state(
        &self,
        user_id: &str,
        agent_id: &str,
    ) -> Result<Option<NarrativeState>> {
        let row = sqlx::query(
            "SELECT state FROM narrative_states WHERE user_id = ? AND agent_id = ?",
        )
        .bind(user_id)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load narrative state")?;

        match row {
            Some(row) => {
                let state: String = row.get("state");
                let state =
                    serde_json::from_str(&state).context("Corrupt narrative state record")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save_narrative_state(
        &self,
        user_id: &str,
        agent_id: &str,
        state: &NarrativeState,
    ) -> Result<()> {
        let json = serde_json::to_string(state).context("Failed to serialize narrative state")?;
        sqlx::query(
            r#"
            INSERT INTO narrative_states (user_id, agent_id, state, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, agent_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(agent_id)
        .bind(json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to save narrative state")?;
        Ok(())
    }

    async fn create_memory_fragment(&self, fragment: &MemoryFragment) -> Result<Uuid> {
        let json = serde_json::to_string(fragment).context("Failed to serialize fragment")?;
        sqlx::query(
            "INSERT INTO memory_fragments (id, user_id, record, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(fragment.id.to_string())
        .bind(&fragment.user_id)
        .bind(json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert memory fragment")?;
        Ok(fragment.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_core::state::{IntroStage, RelationshipStage};

    async fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_state_upsert_round_trip() {
        let (_dir, store) = temp_store().await;

        assert!(store
            .load_narrative_state("u1", "harbor-host")
            .await
            .unwrap()
            .is_none());

        let mut state = NarrativeState::default();
        state.intro_stage = IntroStage::ExpressGratitude;
        state.user_name = Some("Sam".to_string());
        store
            .save_narrative_state("u1", "harbor-host", &state)
            .await
            .unwrap();

        state.has_completed_introduction = true;
        state.relationship_stage = RelationshipStage::Acquaintance;
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
    }

    #[tokio::test]
    async fn test_fragment_insert_and_fetch() {
        let (_dir, store) = temp_store().await;
        let f1 = MemoryFragment::from_exchange("u1", "first story", 0.7);
        let f2 = MemoryFragment::from_exchange("u1", "second story", 0.9);
        let other = MemoryFragment::from_exchange("u2", "someone else", 0.5);

        store.create_memory_fragment(&f1).await.unwrap();
        store.create_memory_fragment(&f2).await.unwrap();
        store.create_memory_fragment(&other).await.unwrap();

        let fetched = store.fragments_for_user("u1").await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().any(|f| f.id == f1.id));
        assert!(fetched.iter().any(|f| f.id == f2.id));
    }
}
