use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid project descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid phase timeline: {0}")]
    InvalidTimeline(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
