use crate::state::IntroStage;
use thiserror::Error;

/// Domain errors surfaced by the narrative engines.
///
/// A missing stage script is a configuration defect and fails the turn;
/// extraction and generation failures are handled locally and never appear
/// here.
#[derive(Debug, Error)]
pub enum ReverieError {
    #[error("persona '{persona}' has no script for stage {stage:?}")]
    MissingScript { persona: String, stage: IntroStage },

    #[error("unknown persona '{0}'")]
    UnknownPersona(String),

    #[error("invalid persona definition '{persona}': {reason}")]
    InvalidPersona { persona: String, reason: String },
}
