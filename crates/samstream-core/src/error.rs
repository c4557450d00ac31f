use thiserror::Error;

/// Core error type for all stream-learning operations.
#[derive(Debug, Error, Clone)]
pub enum StreamError {
    #[error("Attribute count mismatch: expected {expected}, got {got}")]
    AttributeCountMismatch { expected: usize, got: usize },

    #[error("Classifier context not set: call set_context before {0}")]
    ContextNotSet(&'static str),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Ensemble worker failed: {0}")]
    WorkerFailure(String),
}

pub type StreamResult<T> = Result<T, StreamError>;
