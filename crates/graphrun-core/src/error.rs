use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphrunError {
    // Lookup errors
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    // Capability errors. The message is recorded verbatim in a run's `_errors`.
    #[error("{0}")]
    Invocation(String),

    #[error("Capability input validation failed: {0}")]
    InvalidInput(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphrunError {
    /// Shorthand for a capability failure carrying a plain message.
    pub fn invocation(message: impl Into<String>) -> Self {
        Self::Invocation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, GraphrunError>;
