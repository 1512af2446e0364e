//! Bridges the Art-Net node to the generic `dmxd_transport` capability
//! traits (§10.1/§10.7), so the node's logical ports can be registered
//! with `dmxd-registry::PortRegistry` like any other transport's ports:
//! listed, aliased, priority-configured, and patched to a universe.
//!
//! Inbound DMX does not flow through this adapter — a port's contributor
//! identity on the wire is the remote Art-Net node's IPv4 (§3), not the
//! local logical port, so the daemon's main wiring reads `ArtNetEvent::Dmx`
//! straight off the node and feeds it to the universe merge keyed by
//! source address. This adapter only covers what patching and the
//! registry need: listing, priority, and output dispatch.

use async_trait::async_trait;
use dmxd_core::{DmxBuffer, PriorityMode};
use dmxd_transport::{DeviceDescriptor, Plugin, Port, PortKind, PriorityCapability, TransportError};

use crate::constants::ARTNET_MAX_PORTS;
use crate::error::ArtNetError;
use crate::node::{ArtNetEvent, ArtNetNode, NodeConfig};

type TransportResult<T> = dmxd_transport::Result<T>;

/// Static universe-address assignment for the node's fixed logical ports,
/// loaded from `tools/dmxd`'s configuration (§10.4). `None` leaves a
/// logical port disabled.
#[derive(Debug, Clone, Default)]
pub struct ArtNetPluginConfig {
    pub node: NodeConfig,
    pub input_addresses: [Option<(u8, u8)>; ARTNET_MAX_PORTS],
    pub output_addresses: [Option<(u8, u8)>; ARTNET_MAX_PORTS],
}

fn map_artnet_err(context: &str, err: ArtNetError) -> TransportError {
    TransportError::StartFailed(context.to_string(), err.to_string())
}

/// The running Art-Net transport: owns the node, hands out `Port`
/// adapters for registration, and surfaces inbound events for the
/// daemon's merge wiring to drain.
pub struct ArtNetPlugin {
    node: ArtNetNode,
    events: Option<tokio::sync::mpsc::UnboundedReceiver<ArtNetEvent>>,
    config: ArtNetPluginConfig,
    running: bool,
}

impl ArtNetPlugin {
    pub async fn new(config: ArtNetPluginConfig) -> Result<Self, ArtNetError> {
        let (node, events) = ArtNetNode::bind(config.node.clone()).await?;
        Ok(Self {
            node,
            events: Some(events),
            config,
            running: false,
        })
    }

    pub fn node(&self) -> &ArtNetNode {
        &self.node
    }

    /// Takes ownership of the inbound event stream. Must be called once,
    /// before or after `start()`; the daemon wiring drains it into the
    /// universe merge.
    pub fn take_events(&mut self) -> Option<tokio::sync::mpsc::UnboundedReceiver<ArtNetEvent>> {
        self.events.take()
    }

    /// Builds the `Port` set this plugin registers with the device
    /// registry (§4.3), one per configured logical port.
    pub fn device_descriptor(&self) -> DeviceDescriptor {
        let mut ports: Vec<Box<dyn Port>> = Vec::new();
        for (idx, addr) in self.config.input_addresses.iter().enumerate() {
            if let Some((net, sub_uni)) = addr {
                ports.push(Box::new(ArtNetInputPort::new(self.node.clone(), idx as u8, *net, *sub_uni)));
            }
        }
        for (idx, addr) in self.config.output_addresses.iter().enumerate() {
            if let Some((net, sub_uni)) = addr {
                ports.push(Box::new(ArtNetOutputPort::new(self.node.clone(), idx as u8, *net, *sub_uni)));
            }
        }
        DeviceDescriptor {
            unique_id: "artnet".to_string(),
            name: "Art-Net node".to_string(),
            ports,
        }
    }
}

#[async_trait]
impl Plugin for ArtNetPlugin {
    fn id(&self) -> u32 {
        1
    }

    fn name(&self) -> &str {
        "artnet"
    }

    fn description(&self) -> String {
        "Art-Net (ESTA DMX512-over-UDP) transport".to_string()
    }

    async fn start(&mut self) -> TransportResult<()> {
        for (idx, addr) in self.config.input_addresses.iter().enumerate() {
            if let Some((net, sub_uni)) = addr {
                self.node
                    .set_input_port_universe(idx as u8, *net, *sub_uni)
                    .map_err(|e| map_artnet_err("artnet input port", e))?;
            }
        }
        for (idx, addr) in self.config.output_addresses.iter().enumerate() {
            if let Some((net, sub_uni)) = addr {
                self.node
                    .set_output_port_universe(idx as u8, *net, *sub_uni)
                    .map_err(|e| map_artnet_err("artnet output port", e))?;
            }
        }
        self.node.spawn_receive_loop();
        self.node.spawn_maintenance();
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> TransportResult<()> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Registry-facing adapter for one of the node's input logical ports
/// (daemon-facing "input": sources DMX from the network). Contributes no
/// `write_dmx` behavior of its own — inbound merge sources are identified
/// by remote IPv4, not by this port — but still patches, aliases, and
/// carries priority like any other port (§4.3).
pub struct ArtNetInputPort {
    node: ArtNetNode,
    port_id: u8,
    unique_id: String,
    net: u8,
    sub_uni: u8,
    priority: u8,
    priority_mode: PriorityMode,
}

impl ArtNetInputPort {
    pub fn new(node: ArtNetNode, port_id: u8, net: u8, sub_uni: u8) -> Self {
        Self {
            node,
            port_id,
            unique_id: format!("artnet-in-{port_id}"),
            net,
            sub_uni,
            priority: dmxd_core::PRIORITY_DEFAULT,
            priority_mode: PriorityMode::Inherit,
        }
    }

    pub fn universe_address(&self) -> crate::port::UniverseAddress {
        crate::port::UniverseAddress::from_sub_uni(self.net, self.sub_uni)
    }
}

#[async_trait]
impl Port for ArtNetInputPort {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn kind(&self) -> PortKind {
        PortKind::Input
    }

    fn description(&self) -> String {
        format!("Art-Net input, logical port {} ({})", self.port_id, self.node.short_name())
    }

    fn priority_capability(&self) -> PriorityCapability {
        PriorityCapability::Static
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn set_priority(&mut self, priority: u8) -> TransportResult<()> {
        self.priority = priority;
        Ok(())
    }

    fn priority_mode(&self) -> PriorityMode {
        self.priority_mode
    }
}

/// Registry-facing adapter for one of the node's output logical ports
/// (daemon-facing "output": sinks a merged universe to the network).
/// `write_dmx` is the dispatch path §4.2 step 4 drives after a merge
/// changes the universe's output.
pub struct ArtNetOutputPort {
    node: ArtNetNode,
    port_id: u8,
    unique_id: String,
    net: u8,
    sub_uni: u8,
    priority: u8,
    priority_mode: PriorityMode,
}

impl ArtNetOutputPort {
    pub fn new(node: ArtNetNode, port_id: u8, net: u8, sub_uni: u8) -> Self {
        Self {
            node,
            port_id,
            unique_id: format!("artnet-out-{port_id}"),
            net,
            sub_uni,
            priority: dmxd_core::PRIORITY_DEFAULT,
            priority_mode: PriorityMode::Inherit,
        }
    }

    pub fn universe_address(&self) -> crate::port::UniverseAddress {
        crate::port::UniverseAddress::from_sub_uni(self.net, self.sub_uni)
    }
}

#[async_trait]
impl Port for ArtNetOutputPort {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn kind(&self) -> PortKind {
        PortKind::Output
    }

    fn description(&self) -> String {
        format!("Art-Net output, logical port {} ({})", self.port_id, self.node.short_name())
    }

    fn priority_capability(&self) -> PriorityCapability {
        PriorityCapability::Static
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn set_priority(&mut self, priority: u8) -> TransportResult<()> {
        self.priority = priority;
        Ok(())
    }

    fn priority_mode(&self) -> PriorityMode {
        self.priority_mode
    }

    async fn write_dmx(&mut self, buffer: &DmxBuffer) -> TransportResult<()> {
        self.node
            .send_dmx(self.port_id, buffer)
            .await
            .map_err(|e| map_artnet_err("artnet send_dmx", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    async fn plugin() -> ArtNetPlugin {
        let mut config = ArtNetPluginConfig::default();
        config.node.bind_address = Ipv4Addr::LOCALHOST;
        config.input_addresses[0] = Some((0, 0));
        config.output_addresses[0] = Some((0, 3));
        ArtNetPlugin::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn device_descriptor_yields_one_port_per_configured_address() {
        let p = plugin().await;
        let descriptor = p.device_descriptor();
        assert_eq!(descriptor.ports.len(), 2);
        assert_eq!(descriptor.unique_id, "artnet");
    }

    #[tokio::test]
    async fn start_configures_node_addresses_and_marks_running() {
        let mut p = plugin().await;
        assert!(!p.is_running());
        p.start().await.unwrap();
        assert!(p.is_running());
    }

    #[tokio::test]
    async fn output_port_write_dmx_does_not_error_with_no_subscribers() {
        let mut p = plugin().await;
        p.start().await.unwrap();
        let mut out = ArtNetOutputPort::new(p.node().clone(), 0, 0, 3);
        out.write_dmx(&DmxBuffer::from_slice(&[1, 2, 3])).await.unwrap();
    }
}
