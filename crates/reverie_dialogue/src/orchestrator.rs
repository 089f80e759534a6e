//! Top-level turn orchestration.
//!
//! One inbound message is one synchronous unit of work: load state, run
//! whichever engine the completion flag selects, persist, return. Nothing
//! is deferred to background tasks and no state lives outside the store —
//! two concurrent turns for the same pair are simply last-write-wins.

use crate::casual::ConversationNodeGraph;
use crate::generator::Generator;
use crate::introduction::IntroductionStageMachine;
use anyhow::Result;
use reverie_core::persona::PersonaCatalog;
use reverie_core::state::{
    ConversationNode, ConversationState, IntroStage, NarrativeState, Transcript, TranscriptTurn,
};
use reverie_memory::extractor::{HeuristicExtractor, MemoryExtractor};
use reverie_memory::store::NarrativeStore;
use std::sync::Arc;

/// Where the dialogue stands after a turn: an introduction stage while the
/// script is running, a graph node afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnCursor {
    Stage(IntroStage),
    Node(ConversationNode),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TurnMetadata {
    pub conversation_ended: bool,
}

/// Everything a caller gets back from one turn.
#[derive(Debug)]
pub struct TurnOutcome {
    pub response: String,
    pub next: TurnCursor,
    pub narrative: NarrativeState,
    pub conversation: ConversationState,
    pub metadata: TurnMetadata,
}

pub struct NarrativeOrchestrator {
    catalog: PersonaCatalog,
    store: Arc<dyn NarrativeStore>,
    generator: Arc<dyn Generator>,
    extractor: Arc<dyn MemoryExtractor>,
    /// Frozen follow-up selection for reproducible runs; entropy otherwise.
    rng_seed: Option<u64>,
}

impl NarrativeOrchestrator {
    pub fn new(
        catalog: PersonaCatalog,
        store: Arc<dyn NarrativeStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            catalog,
            store,
            generator,
            extractor: Arc::new(HeuristicExtractor::new()),
            rng_seed: None,
        }
    }

    /// Swap the extraction strategy (e.g. a model-based extractor).
    pub fn with_extractor(mut self, extractor: Arc<dyn MemoryExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Process one user message for a (user, agent) pair.
    ///
    /// `history` is the session transcript up to but not including
    /// `message`; `session` is the caller-held conversation-graph state,
    /// `None` at session start.
    ///
    /// Persistence failures degrade rather than fail the turn: the save
    /// error is logged at warn and the generated response still returns,
    /// since the next successful turn re-persists a superset of the state.
    pub async fn process_turn(
        &self,
        user_id: &str,
        agent_id: &str,
        message: &str,
        history: &Transcript,
        session: Option<ConversationState>,
    ) -> Result<TurnOutcome> {
        let persona = self.catalog.get(agent_id)?;

        let mut narrative = self
            .store
            .load_narrative_state(user_id, agent_id)
            .await?
            .unwrap_or_default();
        let conversation = session.unwrap_or_default();

        let mut transcript = history.clone();
        transcript.push(TranscriptTurn::user(message));

        let outcome = if !narrative.has_completed_introduction {
            let mut machine = match self.rng_seed {
                Some(seed) => {
                    IntroductionStageMachine::with_seed(persona, self.extractor.as_ref(), seed)
                }
                None => IntroductionStageMachine::new(persona, self.extractor.as_ref()),
            };
            let intro = machine.advance(user_id, narrative, message, &transcript)?;

            if let Some(fragment) = &intro.memory {
                if let Err(e) = self.store.create_memory_fragment(fragment).await {
                    tracing::warn!("Failed to persist memory fragment: {}", e);
                }
            }

            narrative = intro.state;
            TurnOutcome {
                response: intro.response,
                next: TurnCursor::Stage(narrative.intro_stage),
                narrative: narrative.clone(),
                conversation,
                metadata: TurnMetadata {
                    conversation_ended: intro.conversation_ended,
                },
            }
        } else {
            let graph = ConversationNodeGraph::new(persona, self.generator.as_ref());
            let casual = graph.step(user_id, conversation, message).await;

            if let Some(fragment) = &casual.memory {
                if let Err(e) = self.store.create_memory_fragment(fragment).await {
                    tracing::warn!("Failed to persist memory fragment: {}", e);
                }
            }

            narrative.last_interaction = casual.state.last_interaction;
            TurnOutcome {
                response: casual.response,
                next: TurnCursor::Node(casual.state.current_node),
                narrative: narrative.clone(),
                conversation: casual.state,
                metadata: TurnMetadata::default(),
            }
        };

        if let Err(e) = self
            .store
            .save_narrative_state(user_id, agent_id, &narrative)
            .await
        {
            tracing::warn!("Failed to persist narrative state (degrading): {}", e);
        }

        Ok(outcome)
    }
}
