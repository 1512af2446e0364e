use serde::{Deserialize, Serialize};

/// Identifies a universe by Art-Net net (0-127) and universe-within-net
/// (0-32767). Ordinary (non-Art-Net-sourced) universes use net 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniverseId {
    pub net: u8,
    pub id: u16,
}

impl UniverseId {
    pub fn new(net: u8, id: u16) -> Self {
        Self { net, id }
    }

    /// Convenience constructor for non-Art-Net universes, net defaults to 0.
    pub fn simple(id: u16) -> Self {
        Self { net: 0, id }
    }
}

impl std::fmt::Display for UniverseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.net, self.id)
    }
}

/// Opaque handle identifying a contributor to a universe merge: a port or
/// an RPC client. Equality is by identity, not by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u32);

/// Uniquely identifies a contributor to a `Universe`'s merge set, whichever
/// kind of entity it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Origin {
    Port(PortId),
    Client(ClientId),
    /// Remote Art-Net sender, merged by source IPv4 for a single input port.
    ArtNetRemote(std::net::Ipv4Addr),
}
