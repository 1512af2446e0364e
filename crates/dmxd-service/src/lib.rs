//! `UniverseStore` and the `Service` facade implementing the five RPC
//! operations (§4.2, §4.5): `GetDmx`, `RegisterForDmx`, `UpdateDmxData`,
//! `SetUniverseName`, `SetMergeMode`, plus the Art-Net ingestion and
//! expiry/GC paths the daemon's top-level wiring drives directly.

pub mod error;
pub mod service;
pub mod store;

pub use error::{Result, ServiceError};
pub use service::{ClientUpdate, Service};
pub use store::UniverseStore;
