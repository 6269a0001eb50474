use crate::task::TaskId;

/// Errors raised by the task lifecycle. Every variant leaves the store in
/// the state it had before the rejected operation.
#[derive(Debug, thiserror::Error)]
pub enum DocketError {
    #[error("task text cannot be empty")]
    Validation,

    #[error("no task id left above the largest stored id")]
    IdsExhausted,

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("reorder rejected: {reason}")]
    InvalidReorder { reason: String },

    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    #[error("failed decoding slot {key}: {reason}")]
    PersistenceDecode { key: String, reason: String },

    #[error("storage error on slot {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("presenter failed: {0}")]
    Present(#[source] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DocketError>;
