use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),
}

pub type Result<T> = std::result::Result<T, Error>;
