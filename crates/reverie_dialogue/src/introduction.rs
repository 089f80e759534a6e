//! The scripted six-stage introduction machine.
//!
//! A linear script: any substantive reply advances to the next stage and the
//! response is the next stage's scripted message. The three gated stages
//! hold in place on minimal or negative replies, re-asking with a follow-up
//! prompt instead of moving on — the script exists to reliably seed one
//! structured memory, so it refuses to advance past a stage whose
//! information was never supplied. The terminal stage runs the memory
//! extractor over the whole transcript and hands the relationship off to
//! the casual-conversation graph.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use reverie_core::classify::{ResponseClassifier, ResponseKind};
use reverie_core::error::ReverieError;
use reverie_core::persona::{render_template, DialogueScript, PersonaDefinition};
use reverie_core::state::{IntroStage, NarrativeState, RelationshipStage, Transcript};
use reverie_memory::extractor::MemoryExtractor;
use reverie_memory::fragment::MemoryFragment;

/// Result of one introduction turn.
#[derive(Debug)]
pub struct IntroOutcome {
    pub response: String,
    pub state: NarrativeState,
    /// Fragment mined at the terminal stage, if extraction found a story.
    pub memory: Option<MemoryFragment>,
    /// True exactly once, when the script completes.
    pub conversation_ended: bool,
}

pub struct IntroductionStageMachine<'a> {
    persona: &'a PersonaDefinition,
    extractor: &'a dyn MemoryExtractor,
    classifier: ResponseClassifier,
    rng: StdRng,
}

impl<'a> IntroductionStageMachine<'a> {
    pub fn new(persona: &'a PersonaDefinition, extractor: &'a dyn MemoryExtractor) -> Self {
        Self {
            persona,
            extractor,
            classifier: ResponseClassifier::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded variant so follow-up prompt selection is reproducible.
    pub fn with_seed(
        persona: &'a PersonaDefinition,
        extractor: &'a dyn MemoryExtractor,
        seed: u64,
    ) -> Self {
        Self {
            persona,
            extractor,
            classifier: ResponseClassifier::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Process one user message against the current intro stage.
    ///
    /// `transcript` must already include `message` as its final user turn;
    /// the terminal stage feeds the whole thing to the extractor.
    pub fn advance(
        &mut self,
        user_id: &str,
        mut state: NarrativeState,
        message: &str,
        transcript: &Transcript,
    ) -> Result<IntroOutcome, ReverieError> {
        state.last_interaction = Utc::now();
        let stage = state.intro_stage;

        let Some(next_stage) = stage.next() else {
            return Ok(self.complete(user_id, state, transcript));
        };

        let kind = self.classifier.classify(stage, message);
        match kind {
            ResponseKind::Name => {
                // Only produced at the initial greeting.
                let name = self.classifier.extract_name(message);
                tracing::debug!(name = %name, "Captured user name at greeting");
                state.user_name = Some(name);
                self.step_to(state, next_stage)
            }
            ResponseKind::Negative | ResponseKind::Minimal => {
                let is_negative = kind == ResponseKind::Negative;
                state.stage_repeat_count += 1;
                let response = self.re_ask(stage, is_negative, &state)?;
                Ok(IntroOutcome {
                    response,
                    state,
                    memory: None,
                    conversation_ended: false,
                })
            }
            ResponseKind::Substantive => self.step_to(state, next_stage),
        }
    }

    /// Advance to `next` and speak its scripted message.
    fn step_to(
        &self,
        mut state: NarrativeState,
        next: IntroStage,
    ) -> Result<IntroOutcome, ReverieError> {
        let script = self.persona.stage_message(next)?;
        let response = render_template(&script.message, state.display_name());
        state.intro_stage = next;
        state.stage_repeat_count = 0;
        Ok(IntroOutcome {
            response,
            state,
            memory: None,
            conversation_ended: false,
        })
    }

    /// Hold the stage and restate the ask.
    fn re_ask(
        &mut self,
        stage: IntroStage,
        is_negative: bool,
        state: &NarrativeState,
    ) -> Result<String, ReverieError> {
        let pool = self.persona.follow_up_pool(stage, is_negative);
        let template = match pool.choose(&mut self.rng) {
            Some(prompt) => prompt.as_str(),
            // Catalog validation guarantees gated stages carry a fallback
            // when the pool is empty.
            None => self
                .persona
                .stage_message(stage)?
                .fallback
                .as_deref()
                .unwrap_or(&self.persona.stage_message(stage)?.message),
        };
        Ok(render_template(template, state.display_name()))
    }

    /// Terminal stage: mine the transcript, flip the completion flag,
    /// promote the relationship, and close the script.
    fn complete(
        &self,
        user_id: &str,
        mut state: NarrativeState,
        transcript: &Transcript,
    ) -> IntroOutcome {
        let memory = self.extractor.extract(transcript, user_id, self.persona);
        match &memory {
            Some(fragment) => {
                tracing::info!(title = %fragment.title, "Introduction seeded a memory fragment");
                state.shared_stories.insert(fragment.title.clone());
                for theme in &fragment.context.themes {
                    state.known_topics.insert(theme.clone());
                }
            }
            // Best-effort by design: no story found is a silent no-op.
            None => tracing::debug!("Introduction completed without an extractable story"),
        }

        state.has_completed_introduction = true;
        state.promote_relationship(RelationshipStage::Acquaintance);

        IntroOutcome {
            response: render_template(&self.persona.closing_line, state.display_name()),
            state,
            memory,
            conversation_ended: true,
        }
    }
}
