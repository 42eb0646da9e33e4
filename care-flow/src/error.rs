use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("stage not found: {0}")]
    StageNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("context value missing or invalid: {0}")]
    Context(String),

    #[error("stage execution failed: {0}")]
    StageFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
