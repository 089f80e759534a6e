pub mod casual;
pub mod generator;
pub mod introduction;
pub mod orchestrator;
pub mod providers;
pub mod retry;

pub use casual::{CasualOutcome, ConversationNodeGraph};
pub use generator::{Generator, FALLBACK_REPLY};
pub use introduction::{IntroOutcome, IntroductionStageMachine};
pub use orchestrator::{NarrativeOrchestrator, TurnCursor, TurnMetadata, TurnOutcome};
pub use providers::{MockGenerator, OllamaGenerator};
