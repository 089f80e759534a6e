//! Persona catalog — data-driven dialogue scripts.
//!
//! A persona is pure configuration: display name, trait lists, the scripted
//! message for each introduction stage, follow-up prompt pools, the reveal
//! pitch, and the phrase sets the memory extractor matches against. Adding a
//! persona means adding a TOML file, not code.
//!
//! Two seed personas ship embedded in the binary; external catalogs load
//! from a directory of `.toml` files. Catalog loading validates every
//! persona up front so a missing stage script is rejected at startup rather
//! than surfacing mid-conversation.

use crate::error::ReverieError;
use crate::state::IntroStage;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

const SEED_HOST: &str = include_str!("../personas/harbor_host.toml");
const SEED_CHEF: &str = include_str!("../personas/ember_chef.toml");

/// Script entry for one introduction stage.
#[derive(Debug, Clone, Deserialize)]
pub struct StageScript {
    /// Scripted agent message. `{userName}` is substituted at render time.
    pub message: String,
    /// Descriptive tag for what kind of reply the script hopes for.
    /// Informational only, never used for branching.
    #[serde(default)]
    pub expected: Option<String>,
    /// Last-resort prompt for degenerate cases.
    #[serde(default)]
    pub fallback: Option<String>,
    /// Re-ask prompts used when the user gives a minimal reply.
    #[serde(default)]
    pub follow_ups: Vec<String>,
    /// Dedicated prompts for outright refusals. Take precedence over
    /// `follow_ups` when present.
    #[serde(default)]
    pub negative_follow_ups: Vec<String>,
}

/// A fully-loaded persona definition.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub style: Vec<String>,
    /// Fixed line returned when the introduction completes.
    pub closing_line: String,
    /// The persona-specific activity pitch for the reveal moment.
    pub reveal_pitch: String,
    /// Context handed to the generator while the mini-game is active.
    pub activity_prompt: String,
    /// Greeting used by the casual graph's entry node.
    pub entry_greeting: String,
    /// Substrings identifying this persona's "tell me about a life event"
    /// ask, used to anchor memory extraction in a transcript.
    pub event_ask_phrases: Vec<String>,
    /// Substrings identifying the "when/where did this happen" ask.
    pub when_where_phrases: Vec<String>,
    stages: HashMap<IntroStage, StageScript>,
}

/// The capability surface the introduction machine programs against.
/// Implemented by data-driven definitions today; nothing stops a generated
/// or composed persona from implementing it later.
pub trait DialogueScript {
    /// Scripted message for `stage`, with `{userName}` still unexpanded.
    fn stage_message(&self, stage: IntroStage) -> Result<&StageScript, ReverieError>;

    /// Pool of re-ask prompts for `stage`. The negative pool wins when
    /// `is_negative` and it is non-empty; an empty slice means fall back to
    /// the stage's `fallback` line.
    fn follow_up_pool(&self, stage: IntroStage, is_negative: bool) -> &[String];
}

impl DialogueScript for PersonaDefinition {
    fn stage_message(&self, stage: IntroStage) -> Result<&StageScript, ReverieError> {
        self.stages.get(&stage).ok_or_else(|| ReverieError::MissingScript {
            persona: self.id.clone(),
            stage,
        })
    }

    fn follow_up_pool(&self, stage: IntroStage, is_negative: bool) -> &[String] {
        let Some(script) = self.stages.get(&stage) else {
            return &[];
        };
        if is_negative && !script.negative_follow_ups.is_empty() {
            return &script.negative_follow_ups;
        }
        &script.follow_ups
    }
}

impl PersonaDefinition {
    /// Parse and validate a single persona from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let def: PersonaDefinition =
            toml::from_str(text).context("Failed to parse persona TOML")?;
        def.validate()?;
        Ok(def)
    }

    /// Reject definitions that would fail mid-conversation: every stage
    /// needs a non-empty script, gated stages need some way to re-ask, and
    /// the extractor anchors must exist.
    pub fn validate(&self) -> Result<(), ReverieError> {
        for stage in IntroStage::all() {
            let script =
                self.stages
                    .get(&stage)
                    .ok_or_else(|| ReverieError::MissingScript {
                        persona: self.id.clone(),
                        stage,
                    })?;
            if script.message.trim().is_empty() {
                return Err(ReverieError::MissingScript {
                    persona: self.id.clone(),
                    stage,
                });
            }
            if stage.gated()
                && script.follow_ups.is_empty()
                && script.fallback.is_none()
            {
                return Err(ReverieError::InvalidPersona {
                    persona: self.id.clone(),
                    reason: format!("gated stage {:?} has no follow-ups and no fallback", stage),
                });
            }
        }
        if self.event_ask_phrases.is_empty() {
            return Err(ReverieError::InvalidPersona {
                persona: self.id.clone(),
                reason: "event_ask_phrases is empty".to_string(),
            });
        }
        if self.when_where_phrases.is_empty() {
            return Err(ReverieError::InvalidPersona {
                persona: self.id.clone(),
                reason: "when_where_phrases is empty".to_string(),
            });
        }
        Ok(())
    }

    /// One-line trait summary for generator context.
    pub fn describe(&self) -> String {
        if self.traits.is_empty() {
            format!("{} ({})", self.name, self.category)
        } else {
            format!("{} ({}): {}", self.name, self.category, self.traits.join(", "))
        }
    }
}

/// Substitute `{userName}` in a script template.
pub fn render_template(template: &str, user_name: &str) -> String {
    template.replace("{userName}", user_name)
}

/// Read-only lookup of loaded personas, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PersonaCatalog {
    personas: HashMap<String, PersonaDefinition>,
}

impl PersonaCatalog {
    /// Catalog containing only the embedded seed personas.
    pub fn builtin() -> Result<Self> {
        let mut catalog = Self::default();
        for text in [SEED_HOST, SEED_CHEF] {
            let def = PersonaDefinition::from_toml(text)?;
            catalog.personas.insert(def.id.clone(), def);
        }
        Ok(catalog)
    }

    /// Load every `*.toml` under `dir` on top of the current catalog.
    /// Files that fail to parse or validate abort the load; a half-usable
    /// catalog is worse than a startup error.
    pub async fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read persona directory {}", dir.display()))?;

        let mut loaded = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let text = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let def = PersonaDefinition::from_toml(&text)
                .with_context(|| format!("Invalid persona file {}", path.display()))?;
            tracing::info!(persona = %def.id, file = %path.display(), "Loaded persona");
            self.personas.insert(def.id.clone(), def);
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn get(&self, id: &str) -> Result<&PersonaDefinition, ReverieError> {
        self.personas
            .get(id)
            .ok_or_else(|| ReverieError::UnknownPersona(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.personas.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads_and_validates() {
        let catalog = PersonaCatalog::builtin().unwrap();
        assert_eq!(catalog.ids(), vec!["ember-chef", "harbor-host"]);
    }

    #[test]
    fn test_every_seed_stage_has_a_message() {
        let catalog = PersonaCatalog::builtin().unwrap();
        for id in catalog.ids() {
            let persona = catalog.get(id).unwrap();
            for stage in IntroStage::all() {
                let script = persona.stage_message(stage).unwrap();
                assert!(!script.message.is_empty(), "{}/{:?}", id, stage);
            }
        }
    }

    #[test]
    fn test_event_ask_phrase_appears_in_script() {
        // The extractor anchors on these phrases, so they must literally
        // occur in the stage messages that ask the questions.
        let catalog = PersonaCatalog::builtin().unwrap();
        for id in catalog.ids() {
            let persona = catalog.get(id).unwrap();
            let ask = &persona
                .stage_message(IntroStage::RequestAssistance)
                .unwrap()
                .message
                .to_lowercase();
            assert!(
                persona
                    .event_ask_phrases
                    .iter()
                    .any(|p| ask.contains(&p.to_lowercase())),
                "{} request_assistance script does not contain an event ask phrase",
                id
            );
            let when = &persona
                .stage_message(IntroStage::ExpressGratitude)
                .unwrap()
                .message
                .to_lowercase();
            assert!(
                persona
                    .when_where_phrases
                    .iter()
                    .any(|p| when.contains(&p.to_lowercase())),
                "{} express_gratitude script does not contain a when/where phrase",
                id
            );
        }
    }

    #[test]
    fn test_negative_pool_takes_precedence() {
        let catalog = PersonaCatalog::builtin().unwrap();
        let persona = catalog.get("harbor-host").unwrap();
        let negative = persona.follow_up_pool(IntroStage::RequestAssistance, true);
        let minimal = persona.follow_up_pool(IntroStage::RequestAssistance, false);
        assert!(!negative.is_empty());
        assert!(!minimal.is_empty());
        assert_ne!(negative, minimal);
    }

    #[test]
    fn test_render_template() {
        assert_eq!(
            render_template("Good to meet you, {userName}!", "Sam"),
            "Good to meet you, Sam!"
        );
        assert_eq!(render_template("No placeholder here.", "Sam"), "No placeholder here.");
    }

    #[test]
    fn test_missing_stage_is_rejected() {
        let toml_text = r#"
id = "broken"
name = "Broken"
category = "test"
closing_line = "bye"
reveal_pitch = "let's do a thing"
activity_prompt = "the thing"
entry_greeting = "hi"
event_ask_phrases = ["a story"]
when_where_phrases = ["when did"]

[stages.initial_greeting]
message = "hello"
"#;
        let err = PersonaDefinition::from_toml(toml_text).unwrap_err();
        assert!(err.to_string().contains("no script for stage"));
    }

    #[test]
    fn test_unknown_persona() {
        let catalog = PersonaCatalog::builtin().unwrap();
        assert!(matches!(
            catalog.get("nobody"),
            Err(ReverieError::UnknownPersona(_))
        ));
    }

    #[tokio::test]
    async fn test_load_dir_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let custom = SEED_HOST.replace("Maya Brennan", "Someone Else");
        tokio::fs::write(&path, custom).await.unwrap();

        let mut catalog = PersonaCatalog::builtin().unwrap();
        let loaded = catalog.load_dir(dir.path()).await.unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(catalog.get("harbor-host").unwrap().name, "Someone Else");
    }
}
