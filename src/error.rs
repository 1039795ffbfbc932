use thiserror::Error;

/// Enum for the various failure modes of the store and query layers.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    #[error("profiledb: error encoding chunk")]
    ChunkEncoding,

    #[error("profiledb: error decoding chunk")]
    ChunkDecoding,

    #[error("invalid chunk encoding \"{0}\"")]
    UnsupportedEncoding(u8),

    #[error("bad request: {0}")]
    InvalidQuery(String),

    #[error("out of order sample")]
    OutOfOrderSample,

    #[error("series source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("operation canceled")]
    Canceled,

    #[error("{0}")]
    General(String),
}

pub type StoreResult<T = ()> = Result<T, StoreError>;

impl From<&str> for StoreError {
    fn from(s: &str) -> Self {
        StoreError::General(s.to_string())
    }
}

impl From<String> for StoreError {
    fn from(s: String) -> Self {
        StoreError::General(s)
    }
}
