use thiserror::Error;

/// Result alias for store and engine operations
pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Errors surfaced by the store and the REST layer.
///
/// `Validation` and `NotFound` carry the human-readable detail that the
/// API returns in its `{"detail": ...}` body.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: rusqlite::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &str) -> Self {
        AppError::NotFound(format!("{} not found", entity))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// True for failures caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::NotFound(_) | AppError::Validation(_))
    }
}
