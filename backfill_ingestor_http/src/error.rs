use axum::http::StatusCode;
use backfill_control_plane::ErrorKind;
use backfill_ingestor_core::ImportError;
use thiserror::Error;

/// Errors that can occur in the HTTP ingestor.
#[derive(Error, Debug)]
pub enum HttpIngestorError {
    #[error("bad request: {message}")]
    BadRequest { message: String },
    #[error("payload too large: {message}")]
    PayloadTooLarge { message: String },
    #[error("missing caller identity: {message}")]
    Unauthenticated { message: String },
    #[error(transparent)]
    Import(#[from] ImportError),
}

pub type Result<T, E = HttpIngestorError> = std::result::Result<T, E>;

impl HttpIngestorError {
    /// Machine-readable error kind returned to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            HttpIngestorError::BadRequest { .. } => ErrorKind::Validation.as_str(),
            HttpIngestorError::PayloadTooLarge { .. } => "payload_too_large",
            HttpIngestorError::Unauthenticated { .. } => "unauthenticated",
            HttpIngestorError::Import(err) => err.kind().as_str(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpIngestorError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            HttpIngestorError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            HttpIngestorError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            HttpIngestorError::Import(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::UnrecognizedFormat => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::StoreFailure => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }
}
