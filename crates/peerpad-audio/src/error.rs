//! Audio routing error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no output device available")]
    NoDevice,

    #[error("context refused to resume: {0}")]
    ResumeRefused(String),

    #[error("context is closed")]
    Closed,

    #[error("audio backend error: {0}")]
    Backend(String),
}
