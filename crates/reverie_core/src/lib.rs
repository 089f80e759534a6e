pub mod classify;
pub mod config;
pub mod engagement;
pub mod error;
pub mod persona;
pub mod state;

pub use classify::{ResponseClassifier, ResponseKind};
pub use config::ReverieConfig;
pub use error::ReverieError;
pub use persona::{render_template, DialogueScript, PersonaCatalog, PersonaDefinition, StageScript};
pub use state::{
    ConversationNode, ConversationState, IntroStage, NarrativeState, PersonaScratch,
    RelationshipStage, Speaker, Transcript, TranscriptTurn,
};
