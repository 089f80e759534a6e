//! Post-introduction conversation graph.
//!
//! Five nodes: entry, first meeting, casual conversation, reveal
//! opportunity, mini game. Casual conversation is the hub; the reveal fires
//! at most once, gated on engagement and one boolean generator
//! classification, and the mini game self-loops until the user winds it
//! down. All free-form text comes from the generator with the persona
//! description as context; generator failures degrade to the fixed
//! fallback without disturbing node transitions.

use crate::generator::{classify_or_false, generate_or_fallback, Generator};
use chrono::Utc;
use regex::Regex;
use reverie_core::engagement;
use reverie_core::persona::PersonaDefinition;
use reverie_core::state::{ConversationNode, ConversationState};
use reverie_memory::fragment::MemoryFragment;
use std::sync::LazyLock;

static RE_GAME_DONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)thank|bye|goodbye|done|finish").unwrap());
static RE_ACCEPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(yes|yeah|sure|ok|okay|absolutely|love to|let'?s do|sounds (good|great|fun))\b")
        .unwrap()
});

/// Personal markers that raise an exchange's significance estimate.
const SIGNIFICANCE_MARKERS: &[&str] = &[
    "remember",
    "never told",
    "first time",
    "i feel",
    "i felt",
    "i've never",
    "my mother",
    "my father",
    "changed my life",
];

/// Result of one casual-graph turn.
#[derive(Debug)]
pub struct CasualOutcome {
    pub response: String,
    pub state: ConversationState,
    pub memory: Option<MemoryFragment>,
}

pub struct ConversationNodeGraph<'a> {
    persona: &'a PersonaDefinition,
    generator: &'a dyn Generator,
}

impl<'a> ConversationNodeGraph<'a> {
    pub fn new(persona: &'a PersonaDefinition, generator: &'a dyn Generator) -> Self {
        Self { persona, generator }
    }

    /// Dispatch one user message to the current node's handler.
    pub async fn step(
        &self,
        user_id: &str,
        mut state: ConversationState,
        message: &str,
    ) -> CasualOutcome {
        state.last_interaction = Utc::now();
        match state.current_node {
            ConversationNode::Entry => self.entry(state),
            ConversationNode::FirstMeeting => self.first_meeting(state, message).await,
            ConversationNode::CasualConversation => self.casual(user_id, state, message).await,
            ConversationNode::RevealOpportunity => self.reveal(user_id, state),
            ConversationNode::MiniGame => self.mini_game(state, message).await,
        }
    }

    fn entry(&self, mut state: ConversationState) -> CasualOutcome {
        state.current_node = ConversationNode::FirstMeeting;
        CasualOutcome {
            response: self.persona.entry_greeting.clone(),
            state,
            memory: None,
        }
    }

    async fn first_meeting(
        &self,
        mut state: ConversationState,
        message: &str,
    ) -> CasualOutcome {
        let prompt = format!(
            "The user just said: \"{}\". Reply in character, warmly, as if picking the \
             conversation back up with someone you already know a little.",
            message
        );
        let response = generate_or_fallback(self.generator, &prompt, &self.context()).await;
        state.has_met_before = true;
        state.engagement_level = 0.7;
        state.current_node = ConversationNode::CasualConversation;
        CasualOutcome {
            response,
            state,
            memory: None,
        }
    }

    async fn casual(
        &self,
        user_id: &str,
        mut state: ConversationState,
        message: &str,
    ) -> CasualOutcome {
        // Acceptance of an already-made pitch routes into the mini game.
        if state.reveal_made && !state.user_accepted_activity && RE_ACCEPT.is_match(message) {
            state.user_accepted_activity = true;
            state.current_node = ConversationNode::MiniGame;
            let response = generate_or_fallback(
                self.generator,
                &format!(
                    "The user just agreed to the activity: \"{}\". Kick it off enthusiastically.",
                    message
                ),
                &self.activity_context(),
            )
            .await;
            return CasualOutcome {
                response,
                state,
                memory: None,
            };
        }

        let prompt = format!(
            "The user said: \"{}\". Continue the conversation in character. Keep it natural \
             and ask at most one question.",
            message
        );
        let response = generate_or_fallback(self.generator, &prompt, &self.context()).await;

        let significance = exchange_significance(message);
        let memory = if significance > 0.7 {
            Some(MemoryFragment::from_exchange(user_id, message, significance))
        } else {
            None
        };

        state.engagement_level = engagement::score(message, &response);

        if state.engagement_level >= 0.7 && !state.reveal_made {
            let probe = format!(
                "The user in a warm, engaged conversation just said: \"{}\". Is this a good \
                 moment to propose a shared activity?",
                message
            );
            if classify_or_false(self.generator, &probe).await {
                state.current_node = ConversationNode::RevealOpportunity;
                return CasualOutcome {
                    response,
                    state,
                    memory,
                };
            }
        }

        state.current_node = ConversationNode::CasualConversation;
        CasualOutcome {
            response,
            state,
            memory,
        }
    }

    fn reveal(&self, user_id: &str, mut state: ConversationState) -> CasualOutcome {
        state.reveal_made = true;
        state.current_node = ConversationNode::CasualConversation;
        let memory = MemoryFragment::from_exchange(
            user_id,
            &format!("{} proposed: {}", self.persona.name, self.persona.reveal_pitch),
            0.9,
        );
        CasualOutcome {
            response: self.persona.reveal_pitch.clone(),
            state,
            memory: Some(memory),
        }
    }

    async fn mini_game(&self, mut state: ConversationState, message: &str) -> CasualOutcome {
        state.user_accepted_activity = true;
        let finished = RE_GAME_DONE.is_match(message);
        state.current_node = if finished {
            ConversationNode::CasualConversation
        } else {
            ConversationNode::MiniGame
        };

        let prompt = if finished {
            format!(
                "The user is wrapping up the activity: \"{}\". Close it out warmly and \
                 transition back to regular conversation.",
                message
            )
        } else {
            format!(
                "Mid-activity, the user said: \"{}\". Keep the activity going.",
                message
            )
        };
        let response = generate_or_fallback(self.generator, &prompt, &self.activity_context()).await;
        CasualOutcome {
            response,
            state,
            memory: None,
        }
    }

    fn context(&self) -> String {
        format!(
            "You are {}. Style: {}.",
            self.persona.describe(),
            self.persona.style.join("; ")
        )
    }

    fn activity_context(&self) -> String {
        format!("{} {}", self.context(), self.persona.activity_prompt)
    }
}

/// Placeholder significance heuristic for a single exchange, in [0, 1].
/// Deliberately independent of the transcript-level memory extractor.
fn exchange_significance(message: &str) -> f32 {
    let base = (message.len() as f32 / 200.0).min(0.6);
    let lower = message.to_lowercase();
    let bonus = if SIGNIFICANCE_MARKERS.iter().any(|m| lower.contains(m)) {
        0.4
    } else {
        0.0
    };
    (base + bonus).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockGenerator;
    use reverie_core::persona::PersonaCatalog;

    fn chef() -> PersonaDefinition {
        PersonaCatalog::builtin()
            .unwrap()
            .get("ember-chef")
            .unwrap()
            .clone()
    }

    fn at_node(node: ConversationNode) -> ConversationState {
        ConversationState {
            current_node: node,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_entry_greets_and_moves_on() {
        let persona = chef();
        let gen = MockGenerator::new("a reply");
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let out = graph.step("u1", ConversationState::default(), "hi").await;
        assert_eq!(out.response, persona.entry_greeting);
        assert_eq!(out.state.current_node, ConversationNode::FirstMeeting);
        assert_eq!(gen.calls(), 0);
    }

    #[tokio::test]
    async fn test_first_meeting_sets_engagement() {
        let persona = chef();
        let gen = MockGenerator::new("good to see you again");
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let out = graph
            .step("u1", at_node(ConversationNode::FirstMeeting), "hello again!")
            .await;
        assert_eq!(out.response, "good to see you again");
        assert_eq!(out.state.current_node, ConversationNode::CasualConversation);
        assert!(out.state.has_met_before);
        assert!((out.state.engagement_level - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_casual_self_loops_when_classifier_says_no() {
        let persona = chef();
        // Long canned response keeps engagement at the cap
        let gen = MockGenerator::new(&"r".repeat(250)).with_boolean(false);
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let mut state = at_node(ConversationNode::CasualConversation);
        state.engagement_level = 0.9;
        let long_message = "m".repeat(120);
        let out = graph.step("u1", state, &long_message).await;
        assert_eq!(out.state.current_node, ConversationNode::CasualConversation);
        assert!(!out.state.reveal_made);
    }

    #[tokio::test]
    async fn test_casual_routes_to_reveal_when_gate_opens() {
        let persona = chef();
        let gen = MockGenerator::new(&"r".repeat(250)).with_boolean(true);
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let out = graph
            .step(
                "u1",
                at_node(ConversationNode::CasualConversation),
                &"a long and engaged message about everything on my mind today".repeat(3),
            )
            .await;
        assert_eq!(out.state.current_node, ConversationNode::RevealOpportunity);
    }

    #[tokio::test]
    async fn test_reveal_pitches_once_and_records_memory() {
        let persona = chef();
        let gen = MockGenerator::new("x");
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let out = graph
            .step("u1", at_node(ConversationNode::RevealOpportunity), "oh?")
            .await;
        assert_eq!(out.response, persona.reveal_pitch);
        assert!(out.state.reveal_made);
        assert_eq!(out.state.current_node, ConversationNode::CasualConversation);
        let memory = out.memory.expect("reveal always records a memory");
        assert_eq!(memory.context.significance, 5);
        assert!(memory.description.contains(&persona.reveal_pitch));
    }

    #[tokio::test]
    async fn test_no_second_reveal_after_decline() {
        let persona = chef();
        let gen = MockGenerator::new(&"r".repeat(250)).with_boolean(true);
        let graph = ConversationNodeGraph::new(&persona, &gen);

        // Reveal already made; user talks right past the pitch without a
        // single acceptance word. The gate must stay shut.
        let mut state = at_node(ConversationNode::CasualConversation);
        state.reveal_made = true;
        state.engagement_level = 1.0;
        let out = graph
            .step(
                "u1",
                state,
                &"anyway, as I was telling you before about the garden project".repeat(3),
            )
            .await;
        assert_eq!(out.state.current_node, ConversationNode::CasualConversation);
    }

    #[tokio::test]
    async fn test_acceptance_enters_mini_game() {
        let persona = chef();
        let gen = MockGenerator::new("aprons on, let's go");
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let mut state = at_node(ConversationNode::CasualConversation);
        state.reveal_made = true;
        let out = graph.step("u1", state, "sure, I'd love to!").await;
        assert_eq!(out.state.current_node, ConversationNode::MiniGame);
        assert!(out.state.user_accepted_activity);
    }

    #[tokio::test]
    async fn test_mini_game_self_loops_until_wind_down() {
        let persona = chef();
        let gen = MockGenerator::new("keep stirring");
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let out = graph
            .step("u1", at_node(ConversationNode::MiniGame), "tell me more")
            .await;
        assert_eq!(out.state.current_node, ConversationNode::MiniGame);

        let out = graph
            .step("u1", at_node(ConversationNode::MiniGame), "thanks, bye!")
            .await;
        assert_eq!(out.state.current_node, ConversationNode::CasualConversation);
    }

    #[tokio::test]
    async fn test_significant_exchange_emits_memory() {
        let persona = chef();
        let gen = MockGenerator::new("that sounds like it mattered").with_boolean(false);
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let message = "I remember the first time my father took me fishing before dawn, \
                       I've never told anyone how much that morning meant to me";
        let out = graph
            .step("u1", at_node(ConversationNode::CasualConversation), message)
            .await;
        let memory = out.memory.expect("significant exchange records a memory");
        assert_eq!(memory.user_id, "u1");
        assert!(memory.context.significance >= 4);
    }

    #[test]
    fn test_exchange_significance_bounds() {
        assert!(exchange_significance("hi") < 0.1);
        let marked = "I remember it well, ".repeat(10);
        let s = exchange_significance(&marked);
        assert!(s > 0.7 && s <= 1.0);
    }

    #[tokio::test]
    async fn test_generator_failure_degrades_not_corrupts() {
        let persona = chef();
        let gen = MockGenerator::failing();
        let graph = ConversationNodeGraph::new(&persona, &gen);

        let out = graph
            .step("u1", at_node(ConversationNode::FirstMeeting), "hello")
            .await;
        assert_eq!(out.response, crate::generator::FALLBACK_REPLY);
        // Transition still proceeds as if a response were generated.
        assert_eq!(out.state.current_node, ConversationNode::CasualConversation);
    }
}
