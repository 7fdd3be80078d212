use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid scan configuration: {0}")]
    Config(String),

    #[error("fingerprint error: {0}")]
    Hash(String),

    #[error("malformed scan manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}
