use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors produced while building or executing a consultation flow
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("context error: {0}")]
    ContextError(String),

    #[error("agent execution failed: {0}")]
    AgentExecutionFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
