use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("message too large: {0}")]
    MessageTooLarge(usize),
    #[error("frame too large: {0}")]
    FrameTooLarge(usize),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
