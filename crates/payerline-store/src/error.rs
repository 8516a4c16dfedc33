use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("claim {0} not found")]
    ClaimNotFound(i64),

    #[error("call {0} not found")]
    CallNotFound(i64),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
