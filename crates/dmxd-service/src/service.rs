//! The five-operation RPC facade (§4.5) plus the inbound paths that feed
//! it: client registration/update for RPC callers, and `ingest_remote_dmx`
//! for Art-Net-originated contributions. Every operation that changes a
//! universe's merged output ends in the same dispatch step: push to the
//! universe's patched output ports, then to every registered client.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use dmxd_core::{ClientId, DmxBuffer, MergeMode, Origin, PortId, PriorityMode, Timestamp, UniverseId, PRIORITY_DEFAULT};
use dmxd_registry::PortRegistry;
use dmxd_transport::PortKind;

use crate::error::{Result, ServiceError};
use crate::store::UniverseStore;

/// A merged universe frame pushed to a registered client after a change.
#[derive(Debug, Clone)]
pub struct ClientUpdate {
    pub universe: UniverseId,
    pub data: DmxBuffer,
}

/// Owns the universe store and drives the dispatch fan-out to output
/// ports (via the registry) and RPC clients (via their channel) whenever
/// a merge changes a universe's output.
pub struct Service {
    store: UniverseStore,
    registry: Arc<PortRegistry>,
    clients: DashMap<ClientId, mpsc::UnboundedSender<ClientUpdate>>,
    next_client_id: AtomicU32,
}

impl Service {
    pub fn new(registry: Arc<PortRegistry>) -> Self {
        Self {
            store: UniverseStore::new(),
            registry,
            clients: DashMap::new(),
            next_client_id: AtomicU32::new(1),
        }
    }

    /// Allocates a channel for a newly connected RPC client. The caller
    /// keeps the receiver end and drains `ClientUpdate`s for every universe
    /// the client subsequently registers for.
    pub fn new_client(&self) -> (ClientId, mpsc::UnboundedReceiver<ClientUpdate>) {
        let id = ClientId(self.next_client_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(id, tx);
        (id, rx)
    }

    pub fn drop_client(&self, client: ClientId) {
        self.clients.remove(&client);
    }

    /// `GetDmx` (§4.5): fails `UNIVERSE_MISSING` if the universe has never
    /// been created. Always 512 bytes, right-padded.
    pub fn get_dmx(&self, universe: UniverseId) -> Result<[u8; 512]> {
        self.store
            .with_universe(universe, |u| u.output().padded())
            .ok_or(ServiceError::Core(dmxd_core::Error::UniverseMissing(universe)))
    }

    /// `RegisterForDmx(..., REGISTER)` (§4.5): auto-creates the universe,
    /// set-idempotent membership, and delivers one immediate snapshot so a
    /// freshly registered client doesn't wait for the next change.
    pub fn register_for_dmx(&self, client: ClientId, universe: UniverseId) {
        let output = self.store.with_universe_or_create(universe, |u| {
            u.clients.insert(client);
            u.output().clone()
        });
        if let Some(sender) = self.clients.get(&client) {
            let _ = sender.send(ClientUpdate { universe, data: output });
        }
    }

    /// `RegisterForDmx(..., UNREGISTER)` (§4.5): set-idempotent, marks the
    /// universe for GC if that was its last member.
    pub fn unregister_for_dmx(&self, client: ClientId, universe: UniverseId) {
        let now_empty = self
            .store
            .with_universe(universe, |u| {
                u.clients.remove(&client);
                u.is_gc_eligible()
            })
            .unwrap_or(false);
        if now_empty {
            self.store.mark_for_gc(universe);
        }
    }

    /// `UpdateDmxData` (§4.5): fails `UNIVERSE_MISSING` if absent. Accepts
    /// an empty buffer (drops the client's contribution to nothing, rather
    /// than leaving it unset).
    pub async fn update_dmx_data(&self, client: ClientId, universe: UniverseId, bytes: &[u8]) -> Result<()> {
        if !self.store.exists(universe) {
            return Err(ServiceError::Core(dmxd_core::Error::UniverseMissing(universe)));
        }
        let changed = self
            .store
            .with_universe(universe, |u| {
                u.update_source(
                    Origin::Client(client),
                    DmxBuffer::from_slice(bytes),
                    Timestamp::now(),
                    PRIORITY_DEFAULT,
                    PriorityMode::Inherit,
                )
            })
            .expect("existence checked above")
            .map_err(|()| ServiceError::Core(dmxd_core::Error::PriorityOutOfRange(0)))?;
        if changed {
            self.dispatch(universe).await;
        }
        Ok(())
    }

    /// `SetUniverseName` (§4.5): fails `UNIVERSE_MISSING` if absent.
    pub fn set_universe_name(&self, universe: UniverseId, name: impl Into<String>) -> Result<()> {
        self.store
            .with_universe(universe, |u| u.name = name.into())
            .ok_or(ServiceError::Core(dmxd_core::Error::UniverseMissing(universe)))
    }

    /// `SetMergeMode` (§4.5): fails `UNIVERSE_MISSING` if absent. Triggers
    /// an immediate re-merge of the existing sources under the new policy.
    pub async fn set_merge_mode(&self, universe: UniverseId, mode: MergeMode) -> Result<()> {
        let changed = self
            .store
            .with_universe(universe, |u| {
                u.merge_mode = mode;
                u.remerge()
            })
            .ok_or(ServiceError::Core(dmxd_core::Error::UniverseMissing(universe)))?;
        if changed {
            self.dispatch(universe).await;
        }
        Ok(())
    }

    /// Feeds an Art-Net-origin DMX frame into the universe its sub-net/
    /// universe address maps to, identified by the remote node's IPv4
    /// (§3: Art-Net contributions merge by source address, not by port).
    /// Auto-creates the universe, matching an input port's implicit patch.
    pub async fn ingest_remote_dmx(
        &self,
        universe: UniverseId,
        source: Ipv4Addr,
        buffer: DmxBuffer,
        priority: u8,
    ) -> Result<()> {
        let changed = self
            .store
            .with_universe_or_create(universe, |u| {
                u.update_source(
                    Origin::ArtNetRemote(source),
                    buffer,
                    Timestamp::now(),
                    priority,
                    PriorityMode::Inherit,
                )
            })
            .map_err(|()| ServiceError::Core(dmxd_core::Error::PriorityOutOfRange(priority)))?;
        if changed {
            self.dispatch(universe).await;
        }
        Ok(())
    }

    /// Drops the merge source for a port whose universe patch or priority
    /// changed, or that went offline. A no-op if it held no source.
    pub async fn remove_port_source(&self, universe: UniverseId, port: PortId) {
        let changed = self
            .store
            .with_universe(universe, |u| u.remove_source(Origin::Port(port)))
            .unwrap_or(false);
        if changed {
            self.dispatch(universe).await;
        }
    }

    /// `SourceExpiryTick` (§4.2): ages out every universe's stale sources
    /// and dispatches the ones whose output changed as a result.
    pub async fn expire_sources(&self, now: Timestamp) {
        for universe in self.store.expire_all(now) {
            self.dispatch(universe).await;
        }
    }

    /// Sweeps universes marked for GC since the last sweep.
    pub fn garbage_collect(&self) -> usize {
        self.store.garbage_collect()
    }

    /// §4.2 step 4: pushes the current merged output to every patched
    /// output port and every registered client.
    async fn dispatch(&self, universe: UniverseId) {
        let output = match self.store.with_universe(universe, |u| u.output().clone()) {
            Some(o) => o,
            None => return,
        };

        for (port_id, kind) in self.registry.ports_for_universe(universe) {
            if kind != PortKind::Output {
                continue;
            }
            if let Err(e) = self.registry.write_dmx(port_id, &output).await {
                debug!(?port_id, %e, "output port write_dmx failed");
            }
        }

        let client_ids = self
            .store
            .with_universe(universe, |u| u.clients.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        for client in client_ids {
            if let Some(sender) = self.clients.get(&client) {
                let _ = sender.send(ClientUpdate {
                    universe,
                    data: output.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmxd_registry::MemoryPreferences;

    fn service() -> Service {
        Service::new(Arc::new(PortRegistry::new(Box::new(MemoryPreferences::new()))))
    }

    #[test]
    fn get_dmx_fails_on_unknown_universe() {
        let svc = service();
        assert!(svc.get_dmx(UniverseId::simple(1)).is_err());
    }

    #[tokio::test]
    async fn register_then_update_delivers_a_client_update() {
        let svc = service();
        let (client, mut rx) = svc.new_client();
        let universe = UniverseId::simple(1);
        svc.register_for_dmx(client, universe);
        // Immediate snapshot on register.
        let first = rx.recv().await.unwrap();
        assert_eq!(first.universe, universe);
        assert!(first.data.is_empty());

        svc.update_dmx_data(client, universe, &[9, 9, 9]).await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.data.get(), &[9, 9, 9]);
    }

    #[tokio::test]
    async fn update_dmx_data_fails_on_unknown_universe() {
        let svc = service();
        let (client, _rx) = svc.new_client();
        let err = svc.update_dmx_data(client, UniverseId::simple(5), &[1]).await;
        assert!(err.is_err());
    }

    #[test]
    fn unregister_marks_empty_universe_for_gc() {
        let svc = service();
        let (client, _rx) = svc.new_client();
        let universe = UniverseId::simple(2);
        svc.register_for_dmx(client, universe);
        svc.unregister_for_dmx(client, universe);
        assert_eq!(svc.garbage_collect(), 1);
    }

    #[tokio::test]
    async fn set_merge_mode_remerges_existing_sources() {
        let svc = service();
        let universe = UniverseId::simple(3);
        svc.ingest_remote_dmx(universe, Ipv4Addr::new(10, 0, 0, 1), DmxBuffer::from_slice(&[1, 1, 1]), 100)
            .await
            .unwrap();
        svc.ingest_remote_dmx(universe, Ipv4Addr::new(10, 0, 0, 2), DmxBuffer::from_slice(&[5, 0, 0]), 100)
            .await
            .unwrap();
        assert_eq!(svc.get_dmx(universe).unwrap()[..3], [5, 1, 1]);

        svc.set_merge_mode(universe, MergeMode::Ltp).await.unwrap();
        // LTP picks the most recently updated source outright.
        assert_eq!(svc.get_dmx(universe).unwrap()[..3], [5, 0, 0]);
    }

    #[tokio::test]
    async fn set_merge_mode_fails_on_unknown_universe() {
        let svc = service();
        assert!(svc.set_merge_mode(UniverseId::simple(9), MergeMode::Htp).await.is_err());
    }
}
