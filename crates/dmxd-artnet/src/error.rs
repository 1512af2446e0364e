use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtNetError {
    #[error(transparent)]
    Core(#[from] dmxd_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed Art-Net packet: {0}")]
    Decode(String),

    #[error("port id {0} is out of range (0-3)")]
    PortIdOutOfRange(u8),
}

pub type Result<T> = std::result::Result<T, ArtNetError>;
