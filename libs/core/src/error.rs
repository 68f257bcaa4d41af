use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Checkpoint(#[from] crate::checkpoint::CheckpointError),

    #[error("context window overflow: {0}")]
    ContextWindowOverflow(String),

    #[error("invalid conversation manager state: {0}")]
    InvalidState(String),

    #[error("{0}")]
    Other(String),
}
