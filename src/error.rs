use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("GitHub token required")]
    MissingToken,

    #[error("Request to {url} failed with status {status}")]
    Http { status: u16, url: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No services registered yet")]
    NoServices,

    #[error("Invalid polling interval: {0}ms")]
    InvalidInterval(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Status code of an HTTP failure, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::MissingToken => StatusCode::UNAUTHORIZED,
            SyncError::Http { .. } => StatusCode::BAD_GATEWAY,
            SyncError::Transport(_) => StatusCode::BAD_GATEWAY,
            SyncError::Decode(_) => StatusCode::BAD_GATEWAY,
            SyncError::NoServices => StatusCode::NOT_FOUND,
            SyncError::InvalidInterval(_) => StatusCode::BAD_REQUEST,
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SyncError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
