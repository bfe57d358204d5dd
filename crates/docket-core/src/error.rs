use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocketError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(String),
}
