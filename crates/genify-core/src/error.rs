use thiserror::Error;

/// Top-level error type for Genify.
///
/// Covers the ambient failures of the application shell: configuration,
/// file access and language lookup. Provider failures are not represented here:
/// they are normalized by the chat gateway into its own three-way taxonomy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenifyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),
}

impl From<toml::de::Error> for GenifyError {
    fn from(err: toml::de::Error) -> Self {
        GenifyError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GenifyError {
    fn from(err: toml::ser::Error) -> Self {
        GenifyError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Genify operations.
pub type Result<T> = std::result::Result<T, GenifyError>;
