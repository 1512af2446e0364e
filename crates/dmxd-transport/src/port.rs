use async_trait::async_trait;
use dmxd_core::{DmxBuffer, PriorityMode};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    Input,
    Output,
}

/// How much priority configuration a port exposes, per §3/§4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityCapability {
    /// No configurable priority; always contributes at the default.
    None,
    /// Priority value may be set, but not the inherit/override mode.
    Static,
    /// Both priority value and mode are configurable.
    Full,
}

/// A single input or output DMX port belonging to a device.
///
/// A plugin's port implementation must not block in any method here — the
/// reactor calls these synchronously between readiness waits.
#[async_trait]
pub trait Port: Send + Sync {
    /// Stable across restarts for a given physical/logical port on this
    /// device; used as the registry's patch/priority persistence key.
    fn unique_id(&self) -> &str;

    fn kind(&self) -> PortKind;

    fn description(&self) -> String {
        String::new()
    }

    fn priority_capability(&self) -> PriorityCapability {
        PriorityCapability::None
    }

    fn priority(&self) -> u8;

    fn set_priority(&mut self, priority: u8) -> Result<()>;

    fn priority_mode(&self) -> PriorityMode {
        PriorityMode::Inherit
    }

    fn set_priority_mode(&mut self, _mode: PriorityMode) -> Result<()> {
        Ok(())
    }

    /// Output ports: push a freshly merged universe buffer out over the
    /// transport. Input ports do not implement this (default no-op).
    async fn write_dmx(&mut self, _buffer: &DmxBuffer) -> Result<()> {
        Ok(())
    }

    /// True if this port can carry a timecode fan-out, per §4.3.
    fn supports_timecode(&self) -> bool {
        false
    }

    async fn send_timecode(&mut self, _frame: [u8; 4]) -> Result<()> {
        Ok(())
    }
}
