//! Capability interfaces shared by every transport plugin: `Plugin`, `Port`,
//! and the device descriptor a plugin hands to the registry on start.

mod error;
mod plugin;
mod port;

pub use error::{Result, TransportError};
pub use plugin::{DeviceDescriptor, Plugin};
pub use port::{Port, PortKind, PriorityCapability};
