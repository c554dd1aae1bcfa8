use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded writing {key}: needs {needed} units, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the store rejected a write because it ran out of room,
    /// as opposed to failing for any other reason.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}
