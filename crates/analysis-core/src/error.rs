use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Not supported: {0}")]
    Unsupported(String),
}
