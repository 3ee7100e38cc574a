use thiserror::Error;

#[derive(Error, Debug)]
pub enum LigaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote backend returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Batch write to '{collection}' incomplete: {written} written, {failed} failed")]
    PartialBatch {
        collection: &'static str,
        written:    usize,
        failed:     usize,
    },

    #[error("Item in '{collection}' has no usable id")]
    MissingId { collection: &'static str },

    #[error("'{id}' not found in '{collection}'")]
    NotFound { collection: &'static str, id: String },

    #[error("Local store lock poisoned")]
    StoreLockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LigaResult<T> = Result<T, LigaError>;
