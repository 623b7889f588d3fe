use thiserror::Error;

#[derive(Debug, Error)]
pub enum QrSolveError {
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Value error: {0}")]
    Value(String),

    #[error("Native solver error: {0}")]
    Native(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QrSolveError>;
