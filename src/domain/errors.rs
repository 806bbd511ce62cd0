use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found")]
    NotFound,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Could not allocate a unique order reference")]
    OrderRefExhausted,
    #[error("Internal error: {0}")]
    Internal(String),
}
