//! Shared data model for the dmxd routing daemon: the DMX buffer, universe
//! merge state, stable identifiers, monotonic timestamps, and the error
//! taxonomy every other crate in the workspace builds on.

pub mod buffer;
pub mod error;
pub mod id;
pub mod time;
pub mod universe;

pub use buffer::{DmxBuffer, DMX_UNIVERSE_SIZE};
pub use error::{Error, Result};
pub use id::{ClientId, Origin, PortId, UniverseId};
pub use time::Timestamp;
pub use universe::{MergeMode, MergeSource, PriorityMode, Universe, MAX_MERGE_SOURCES};

/// Priority values configurable on a port or merge source, per §3.
pub const PRIORITY_MIN: u8 = 0;
pub const PRIORITY_MAX: u8 = 200;
pub const PRIORITY_DEFAULT: u8 = 100;
