use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReverieConfig {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub narrative: NarrativeDefaults,
}

impl ReverieConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. Env var overrides are applied after loading.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: ReverieConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults
    /// with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REVERIE_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("REVERIE_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REVERIE_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("REVERIE_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("REVERIE_DB_PATH") {
            self.store.db_path = v;
        }
        if let Ok(v) = std::env::var("REVERIE_PERSONA_DIR") {
            self.narrative.persona_dir = Some(v);
        }
        if let Ok(v) = std::env::var("REVERIE_DEFAULT_PERSONA") {
            self.narrative.default_persona = v;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "ollama" or "mock".
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.1".to_string(),
            base_url: None,
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "reverie.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarrativeDefaults {
    /// Extra persona TOML files loaded on top of the embedded seeds.
    pub persona_dir: Option<String>,
    pub default_persona: String,
}

impl Default for NarrativeDefaults {
    fn default() -> Self {
        Self {
            persona_dir: None,
            default_persona: "harbor-host".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
