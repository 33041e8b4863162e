use thiserror::Error;

/// Errors produced while loading, resolving, validating, or serializing
/// configuration trees.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error at {path}: {message}")]
    Validation { path: String, message: String },

    #[error("Resolver error: {0}")]
    Resolver(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Circular reference: {0}")]
    Circular(String),

    #[error("Type coercion error at {path}: {message}")]
    Coercion { path: String, message: String },
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
