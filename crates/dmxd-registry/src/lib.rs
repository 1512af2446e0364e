//! Device/port registry: stable alias assignment, port↔universe patching,
//! priority persistence, timecode fan-out, and the preferences collaborator
//! patches and priorities are persisted through.

mod device;
mod error;
mod preferences;
mod registry;

pub use device::{Device, MISSING_DEVICE_ALIAS};
pub use error::{RegistryError, Result};
pub use preferences::{FilePreferences, MemoryPreferences, PreferencesFactory, PreferencesHandle};
pub use registry::{PortRegistry, PORT_PREFERENCES};
