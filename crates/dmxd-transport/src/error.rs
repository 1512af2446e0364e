use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Core(#[from] dmxd_core::Error),

    #[error("plugin {0} failed to start: {1}")]
    StartFailed(String, String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
