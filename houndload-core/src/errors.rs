use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Failed to reach the graph store {0}")]
    Transport(anyhow::Error),

    #[error("Graph store rejected the statement ({code}): {message}")]
    Server { code: String, message: String },

    #[error("Failed to decode the graph store response {0}")]
    Decode(serde_json::Error),

    #[error("Graph session is already closed")]
    SessionClosed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatementError {
    #[error("`{0}` is not a valid label or relationship type")]
    InvalidIdentifier(String),

    #[error("statement is empty")]
    Empty,
}
