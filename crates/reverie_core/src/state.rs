//! Narrative and conversation state records.
//!
//! `NarrativeState` is the persisted per-(user, agent) record: how far the
//! scripted introduction has progressed, what relationship tier the pair is
//! at, and what the agent has learned so far. `ConversationState` is the
//! transient per-session record driving the casual-conversation graph.
//!
//! Both are plain serde structs; every turn receives state as input and
//! returns the updated copy. No module-level caches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The six fixed steps of the scripted introduction.
///
/// Ordering is significant: a stage only ever advances to the next variant
/// or repeats in place, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroStage {
    InitialGreeting,
    EstablishScenario,
    RevealCapabilities,
    RequestAssistance,
    ExpressGratitude,
    EstablishRelationship,
}

impl IntroStage {
    /// The next stage in script order, or `None` at the terminal stage.
    pub fn next(self) -> Option<IntroStage> {
        use IntroStage::*;
        match self {
            InitialGreeting => Some(EstablishScenario),
            EstablishScenario => Some(RevealCapabilities),
            RevealCapabilities => Some(RequestAssistance),
            RequestAssistance => Some(ExpressGratitude),
            ExpressGratitude => Some(EstablishRelationship),
            EstablishRelationship => None,
        }
    }

    /// Stages where a minimal or negative reply holds the script in place
    /// instead of advancing it.
    pub fn gated(self) -> bool {
        matches!(
            self,
            IntroStage::RevealCapabilities
                | IntroStage::RequestAssistance
                | IntroStage::ExpressGratitude
        )
    }

    pub fn all() -> [IntroStage; 6] {
        use IntroStage::*;
        [
            InitialGreeting,
            EstablishScenario,
            RevealCapabilities,
            RequestAssistance,
            ExpressGratitude,
            EstablishRelationship,
        ]
    }
}

/// Relationship tier between user and agent. Monotonically non-decreasing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStage {
    #[default]
    Stranger,
    Acquaintance,
    Friend,
}

/// Nodes of the post-introduction conversation graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationNode {
    #[default]
    Entry,
    FirstMeeting,
    CasualConversation,
    RevealOpportunity,
    MiniGame,
}

/// Persona-private scratch state.
///
/// A closed tagged union instead of an open string map, so that every field
/// a persona relies on is named and transitions stay exhaustively checkable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "persona", rename_all = "snake_case")]
pub enum PersonaScratch {
    #[default]
    None,
    /// Podcast-host persona: whether the show pitch has landed.
    Host {
        #[serde(default)]
        episode_invited: bool,
    },
    /// Chef persona: whether a recipe has been offered yet.
    Chef {
        #[serde(default)]
        recipe_offered: bool,
    },
}

/// Persisted per-(user, agent) narrative record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeState {
    /// Flips false → true exactly once, when the scripted introduction
    /// reaches its terminal stage. Never reverts.
    pub has_completed_introduction: bool,
    pub relationship_stage: RelationshipStage,
    pub intro_stage: IntroStage,
    /// How many times the current stage has repeated without advancing.
    pub stage_repeat_count: u32,
    /// User name captured at the initial greeting, if any.
    pub user_name: Option<String>,
    /// Topics the agent knows the user cares about. Accumulate only.
    pub known_topics: BTreeSet<String>,
    /// Story titles already mined from this pair. Accumulate only.
    pub shared_stories: BTreeSet<String>,
    pub last_interaction: DateTime<Utc>,
    pub scratch: PersonaScratch,
}

impl Default for NarrativeState {
    fn default() -> Self {
        Self {
            has_completed_introduction: false,
            relationship_stage: RelationshipStage::Stranger,
            intro_stage: IntroStage::InitialGreeting,
            stage_repeat_count: 0,
            user_name: None,
            known_topics: BTreeSet::new(),
            shared_stories: BTreeSet::new(),
            last_interaction: Utc::now(),
            scratch: PersonaScratch::None,
        }
    }
}

impl NarrativeState {
    /// Promote the relationship tier; never demotes.
    pub fn promote_relationship(&mut self, to: RelationshipStage) {
        if to > self.relationship_stage {
            self.relationship_stage = to;
        }
    }

    /// Display name for script templates, defaulting to "there".
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or("there")
    }
}

/// Transient per-session conversation-graph state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub current_node: ConversationNode,
    pub has_met_before: bool,
    /// Derived user-investment estimate in [0, 1].
    pub engagement_level: f32,
    pub reveal_made: bool,
    pub user_accepted_activity: bool,
    pub last_interaction: DateTime<Utc>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            current_node: ConversationNode::Entry,
            has_met_before: false,
            engagement_level: 0.0,
            reveal_made: false,
            user_accepted_activity: false,
            last_interaction: Utc::now(),
        }
    }
}

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

/// One utterance in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
        }
    }
}

/// Ordered conversation history for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub turns: Vec<TranscriptTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: TranscriptTurn) {
        self.turns.push(turn);
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Index of the first agent turn whose text contains any of `phrases`
    /// (case-insensitive).
    pub fn find_agent_turn(&self, phrases: &[String]) -> Option<usize> {
        self.turns.iter().position(|t| {
            t.speaker == Speaker::Agent
                && phrases
                    .iter()
                    .any(|p| t.text.to_lowercase().contains(&p.to_lowercase()))
        })
    }

    /// The first user turn strictly after `index`, if any.
    pub fn user_turn_after(&self, index: usize) -> Option<&TranscriptTurn> {
        self.turns
            .iter()
            .skip(index + 1)
            .find(|t| t.speaker == Speaker::User)
    }

    pub fn user_turns(&self) -> impl Iterator<Item = &TranscriptTurn> {
        self.turns.iter().filter(|t| t.speaker == Speaker::User)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intro_stage_order_is_linear() {
        let all = IntroStage::all();
        for pair in all.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(IntroStage::EstablishRelationship.next(), None);
    }

    #[test]
    fn test_intro_stage_keys_a_hash_map() {
        // Stage scripts are stored in a HashMap keyed by stage.
        let mut scripts = std::collections::HashMap::new();
        for stage in IntroStage::all() {
            scripts.insert(stage, "scripted line");
        }
        assert_eq!(scripts.len(), IntroStage::all().len());
        assert!(scripts.get(&IntroStage::ExpressGratitude).is_some());
    }

    #[test]
    fn test_gated_stages() {
        assert!(!IntroStage::InitialGreeting.gated());
        assert!(!IntroStage::EstablishScenario.gated());
        assert!(IntroStage::RevealCapabilities.gated());
        assert!(IntroStage::RequestAssistance.gated());
        assert!(IntroStage::ExpressGratitude.gated());
        assert!(!IntroStage::EstablishRelationship.gated());
    }

    #[test]
    fn test_relationship_never_demotes() {
        let mut state = NarrativeState::default();
        state.promote_relationship(RelationshipStage::Friend);
        assert_eq!(state.relationship_stage, RelationshipStage::Friend);
        state.promote_relationship(RelationshipStage::Acquaintance);
        assert_eq!(state.relationship_stage, RelationshipStage::Friend);
    }

    #[test]
    fn test_display_name_defaults_to_there() {
        let mut state = NarrativeState::default();
        assert_eq!(state.display_name(), "there");
        state.user_name = Some("Sam".to_string());
        assert_eq!(state.display_name(), "Sam");
    }

    #[test]
    fn test_transcript_find_agent_turn() {
        let mut t = Transcript::new();
        t.push(TranscriptTurn::agent("Hello! What's your name?"));
        t.push(TranscriptTurn::user("Sam"));
        t.push(TranscriptTurn::agent("Tell me about a moment that stayed with you."));
        t.push(TranscriptTurn::user("I once got lost in Tokyo."));

        let idx = t
            .find_agent_turn(&["moment that stayed with you".to_string()])
            .unwrap();
        assert_eq!(idx, 2);
        let story = t.user_turn_after(idx).unwrap();
        assert_eq!(story.text, "I once got lost in Tokyo.");
    }

    #[test]
    fn test_transcript_user_turn_after_missing() {
        let mut t = Transcript::new();
        t.push(TranscriptTurn::agent("Anything else?"));
        assert!(t.user_turn_after(0).is_none());
    }

    #[test]
    fn test_state_json_round_trip() {
        let mut state = NarrativeState::default();
        state.intro_stage = IntroStage::RequestAssistance;
        state.known_topics.insert("cooking".to_string());
        state.scratch = PersonaScratch::Chef {
            recipe_offered: true,
        };

        let json = serde_json::to_string(&state).unwrap();
        let back: NarrativeState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
