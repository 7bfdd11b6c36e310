use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkerError>;

#[derive(Error, Debug)]
pub enum ChunkerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported language for AST chunking: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to parse source as {language}")]
    ParseFailed { language: String },
}
