use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Core(#[from] dmxd_core::Error),

    #[error("preferences I/O failed: {0}")]
    Preferences(String),

    #[error(transparent)]
    Transport(#[from] dmxd_transport::TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
