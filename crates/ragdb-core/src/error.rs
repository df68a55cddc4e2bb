use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Collection '{0}' not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Collection '{collection}' was indexed with '{indexed_with}' but the active embedder is '{querying_with}'")]
    EmbedderMismatch {
        collection: String,
        indexed_with: String,
        querying_with: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap any backend failure (LanceDB, Arrow, JSON) as a storage error.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }

    /// Upstream embedding failures carry their full `anyhow` context chain.
    pub fn embedding(err: anyhow::Error) -> Self {
        Error::Embedding(format!("{err:#}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
