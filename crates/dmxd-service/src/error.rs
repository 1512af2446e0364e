use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] dmxd_core::Error),

    #[error(transparent)]
    Registry(#[from] dmxd_registry::RegistryError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
