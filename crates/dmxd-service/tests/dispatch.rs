//! End-to-end dispatch: a client's `UpdateDmxData` call should reach a
//! registered output port's `write_dmx`, not just the universe's internal
//! merged state.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dmxd_core::{DmxBuffer, PriorityMode, UniverseId};
use dmxd_registry::{MemoryPreferences, PortRegistry};
use dmxd_service::Service;
use dmxd_transport::{Port, PortKind, PriorityCapability, Result as TransportResult};

struct RecordingPort {
    priority: u8,
    mode: PriorityMode,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl Port for RecordingPort {
    fn unique_id(&self) -> &str {
        "recorder:0"
    }
    fn kind(&self) -> PortKind {
        PortKind::Output
    }
    fn priority_capability(&self) -> PriorityCapability {
        PriorityCapability::Full
    }
    fn priority(&self) -> u8 {
        self.priority
    }
    fn set_priority(&mut self, priority: u8) -> TransportResult<()> {
        self.priority = priority;
        Ok(())
    }
    fn priority_mode(&self) -> PriorityMode {
        self.mode
    }
    fn set_priority_mode(&mut self, mode: PriorityMode) -> TransportResult<()> {
        self.mode = mode;
        Ok(())
    }
    async fn write_dmx(&mut self, buffer: &DmxBuffer) -> TransportResult<()> {
        self.writes.lock().unwrap().push(buffer.get().to_vec());
        Ok(())
    }
}

#[tokio::test]
async fn update_dmx_data_fans_out_to_a_patched_output_port() {
    let registry = Arc::new(PortRegistry::new(Box::new(MemoryPreferences::new())));
    let writes = Arc::new(Mutex::new(Vec::new()));
    registry
        .register_device(
            "recorder",
            "recording output",
            vec![Box::new(RecordingPort {
                priority: 100,
                mode: PriorityMode::Inherit,
                writes: writes.clone(),
            })],
        )
        .unwrap();
    let port_id = registry.devices()[0].port_ids[0];
    let universe = UniverseId::simple(1);
    registry.patch(port_id, universe).unwrap();

    let service = Service::new(registry.clone());
    let (client, _rx) = service.new_client();
    service.register_for_dmx(client, universe);
    service.update_dmx_data(client, universe, &[1, 2, 3]).await.unwrap();

    assert_eq!(writes.lock().unwrap().last(), Some(&vec![1u8, 2, 3]));
}

#[tokio::test]
async fn remote_artnet_ingestion_also_reaches_patched_output_ports() {
    let registry = Arc::new(PortRegistry::new(Box::new(MemoryPreferences::new())));
    let writes = Arc::new(Mutex::new(Vec::new()));
    registry
        .register_device(
            "recorder",
            "recording output",
            vec![Box::new(RecordingPort {
                priority: 100,
                mode: PriorityMode::Inherit,
                writes: writes.clone(),
            })],
        )
        .unwrap();
    let port_id = registry.devices()[0].port_ids[0];
    let universe = UniverseId::simple(2);
    registry.patch(port_id, universe).unwrap();

    let service = Service::new(registry.clone());
    service
        .ingest_remote_dmx(universe, Ipv4Addr::new(10, 0, 0, 5), DmxBuffer::from_slice(&[7, 7, 7]), 100)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(writes.lock().unwrap().last(), Some(&vec![7u8, 7, 7]));
}
