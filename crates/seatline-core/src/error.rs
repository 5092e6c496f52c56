use thiserror::Error;

/// Top-level error type for Seatline infrastructure.
///
/// Domain-rule rejections live in `seatline-booking`; this type covers the
/// failures of collaborators (configuration, storage, serialization) that
/// the booking engine propagates instead of recovering from.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeatlineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for SeatlineError {
    fn from(err: toml::de::Error) -> Self {
        SeatlineError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SeatlineError {
    fn from(err: toml::ser::Error) -> Self {
        SeatlineError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SeatlineError {
    fn from(err: serde_json::Error) -> Self {
        SeatlineError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Seatline operations.
pub type Result<T> = std::result::Result<T, SeatlineError>;
