//! Error types for bridge-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// bridge-core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Event failed structural validation, or signature verification was
    /// requested and failed
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bencode encoding error (used for BEP-44 pointer `v` dictionaries)
    #[error("bencode error: {0}")]
    Bencode(String),

    /// Malformed magnet URI
    #[error("invalid magnet uri: {0}")]
    InvalidMagnet(String),

    /// Hex decoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Invalid key material (wrong length, not on curve, etc.)
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Signature verification or creation failed
    #[error("signature error: {0}")]
    Signature(String),
}
