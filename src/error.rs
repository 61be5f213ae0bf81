use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("dataset is missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("invalid dataset input: {0}")]
    Input(String),

    #[error("embedding provider failed: {0}")]
    EmbeddingProvider(#[from] EmbeddingError),

    #[error("storage failure: {0}")]
    Storage(#[source] StorageError),

    #[error("refresh already in progress (lease held by {holder})")]
    Locked { holder: String },
}

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LeaseLost { holder, .. } => Self::Locked {
                holder: holder.unwrap_or_else(|| "none (lease expired)".to_string()),
            },
            other => Self::Storage(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("expected {expected} embeddings, received {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding {index} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("response indices are not a permutation of 0..{expected}")]
    IndexMismatch { expected: usize },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("timed out after {waited_ms}ms waiting for a pooled connection")]
    PoolTimeout { waited_ms: u128 },

    #[error("connection pool state poisoned")]
    PoolPoisoned,

    #[error("invalid metadata value: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("stored embedding {id} has {len} bytes, expected {expected}")]
    CorruptEmbedding { id: i64, len: usize, expected: usize },

    #[error("lease {name} is no longer held by {holder_was}")]
    LeaseLost {
        name: String,
        holder_was: String,
        holder: Option<String>,
    },
}
