use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("reactor wait failed: {0}")]
    WaitFailed(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReactorError>;
