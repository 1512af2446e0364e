//! Art-Net transport (§4.4): the node state machine, the wire codec for
//! every opcode in the inbound dispatch table, the RDM command encoding
//! and queueing controller, and the `dmxd_transport::Plugin`/`Port`
//! adapter that registers Art-Net's logical ports with the device
//! registry (§10.7).

pub mod constants;
pub mod error;
pub mod node;
pub mod packet;
pub mod plugin;
pub mod port;
pub mod rdm;
pub mod rdm_queue;
pub mod uid;

pub use error::{ArtNetError, Result};
pub use node::{ArtNetEvent, ArtNetNode, NodeConfig};
pub use plugin::{ArtNetPlugin, ArtNetPluginConfig};
pub use port::UniverseAddress;
pub use rdm::{CommandClass, RdmOutcome, RdmRequest, RdmResponse};
pub use rdm_queue::QueueingRdmController;
pub use uid::Uid;
