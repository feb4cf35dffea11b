use thiserror::Error;

/// Top-level error type shared by the Mailgraph crates.
///
/// Subsystem crates define their own error types and convert from
/// `MailgraphError` where configuration or serialization failures cross
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MailgraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MailgraphError {
    fn from(err: toml::de::Error) -> Self {
        MailgraphError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MailgraphError {
    fn from(err: toml::ser::Error) -> Self {
        MailgraphError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MailgraphError {
    fn from(err: serde_json::Error) -> Self {
        MailgraphError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Mailgraph operations.
pub type Result<T> = std::result::Result<T, MailgraphError>;
