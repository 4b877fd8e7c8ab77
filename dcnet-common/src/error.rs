use thiserror::Error;

/// Errors that can occur while loading configuration or performing the
/// handshake/round cryptography. These never cross a session boundary verbatim;
/// callers decide whether a given variant is worth logging or silently dropping.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("rsa error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("rsa pkcs8 error: {0}")]
    Pkcs8(String),

    #[error("aes-eax error")]
    Aead,

    #[error("bad signature")]
    BadSignature,

    #[error("stale handshake timestamp")]
    StaleTimestamp,

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed handshake envelope: {0}")]
    Malformed(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
