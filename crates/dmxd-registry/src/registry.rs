use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use dashmap::DashMap;
use dmxd_core::{DmxBuffer, PortId, PriorityMode, UniverseId};
use dmxd_transport::Port;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::device::{Device, MISSING_DEVICE_ALIAS};
use crate::error::{RegistryError, Result};
use crate::preferences::PreferencesHandle;

pub const PORT_PREFERENCES: &str = "port";
const PRIORITY_VALUE_SUFFIX: &str = "_priority_value";
const PRIORITY_MODE_SUFFIX: &str = "_priority_mode";

struct PortEntry {
    device_unique_id: String,
    universe: Option<UniverseId>,
    port: Box<dyn Port>,
}

/// Device/port registry: stable alias assignment across plugin reloads,
/// port↔universe patching, priority persistence, and timecode fan-out
/// (§4.3, supplemented by §10.6 from the original `DeviceManager`).
pub struct PortRegistry {
    devices: DashMap<String, Device>,
    aliases: DashMap<String, u32>,
    next_alias: AtomicU32,
    next_port_id: AtomicU64,
    ports: DashMap<PortId, PortEntry>,
    timecode_ports: RwLock<Vec<PortId>>,
    prefs: parking_lot::Mutex<Box<dyn PreferencesHandle>>,
}

impl PortRegistry {
    pub fn new(prefs: Box<dyn PreferencesHandle>) -> Self {
        Self {
            devices: DashMap::new(),
            aliases: DashMap::new(),
            next_alias: AtomicU32::new(1),
            next_port_id: AtomicU64::new(1),
            ports: DashMap::new(),
            timecode_ports: RwLock::new(Vec::new()),
            prefs: parking_lot::Mutex::new(prefs),
        }
    }

    /// Registers a device and its ports. Returns the device's alias, reused
    /// from a prior registration of the same `unique_id` if one exists
    /// (§4.3, §10.6).
    pub fn register_device(
        &self,
        unique_id: impl Into<String>,
        name: impl Into<String>,
        ports: Vec<Box<dyn Port>>,
    ) -> Result<u32> {
        let unique_id = unique_id.into();
        if unique_id.is_empty() {
            return Err(RegistryError::Core(dmxd_core::Error::PortUnknown(
                "empty device unique_id".into(),
            )));
        }
        if self.devices.contains_key(&unique_id) {
            return Err(RegistryError::Core(dmxd_core::Error::DeviceAlreadyRegistered(
                unique_id,
            )));
        }

        let alias = *self
            .aliases
            .entry(unique_id.clone())
            .or_insert_with(|| self.next_alias.fetch_add(1, Ordering::SeqCst));

        let mut port_ids = Vec::with_capacity(ports.len());
        for mut port in ports {
            self.restore_port_settings(port.as_mut());
            let id = self.alloc_port_id();
            port_ids.push(id);
            if port.supports_timecode() {
                self.timecode_ports.write().push(id);
            }
            self.ports.insert(
                id,
                PortEntry {
                    device_unique_id: unique_id.clone(),
                    universe: None,
                    port,
                },
            );
        }

        info!(unique_id = %unique_id, alias, "device registered");
        self.devices.insert(
            unique_id.clone(),
            Device {
                unique_id,
                alias,
                name: name.into(),
                port_ids,
            },
        );
        Ok(alias)
    }

    /// Clears the device pointer but keeps the alias reservation, per
    /// §4.3/§10.6.
    pub fn unregister_device(&self, unique_id: &str) {
        if let Some((_, device)) = self.devices.remove(unique_id) {
            for port_id in device.port_ids {
                self.ports.remove(&port_id);
                self.timecode_ports.write().retain(|id| *id != port_id);
            }
            info!(unique_id, "device unregistered");
        } else {
            warn!(unique_id, "unregister of unknown device ignored");
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.devices.iter().map(|e| e.value().clone()).collect()
    }

    pub fn alias_of(&self, unique_id: &str) -> u32 {
        self.aliases
            .get(unique_id)
            .map(|a| *a)
            .unwrap_or(MISSING_DEVICE_ALIAS)
    }

    fn alloc_port_id(&self) -> PortId {
        PortId(self.next_port_id.fetch_add(1, Ordering::SeqCst) as u32)
    }

    /// Attaches `port_id` to `universe`, unpatching any previous universe
    /// first, and persists the mapping (§4.3 step 1-3).
    pub fn patch(&self, port_id: PortId, universe: UniverseId) -> Result<()> {
        let mut entry = self
            .ports
            .get_mut(&port_id)
            .ok_or_else(|| RegistryError::Core(dmxd_core::Error::PortUnknown(port_id.0.to_string())))?;
        entry.universe = Some(universe);
        let key = entry.port.unique_id().to_string();
        drop(entry);
        self.prefs.lock().set(&key, universe.to_string());
        Ok(())
    }

    pub fn unpatch(&self, port_id: PortId) -> Result<()> {
        let mut entry = self
            .ports
            .get_mut(&port_id)
            .ok_or_else(|| RegistryError::Core(dmxd_core::Error::PortUnknown(port_id.0.to_string())))?;
        entry.universe = None;
        let key = entry.port.unique_id().to_string();
        drop(entry);
        self.prefs.lock().remove(&key);
        Ok(())
    }

    pub fn universe_of(&self, port_id: PortId) -> Option<UniverseId> {
        self.ports.get(&port_id).and_then(|e| e.universe)
    }

    pub fn set_priority(&self, port_id: PortId, priority: u8) -> Result<()> {
        if priority > dmxd_core::PRIORITY_MAX {
            return Err(RegistryError::Core(dmxd_core::Error::PriorityOutOfRange(priority)));
        }
        let mut entry = self
            .ports
            .get_mut(&port_id)
            .ok_or_else(|| RegistryError::Core(dmxd_core::Error::PortUnknown(port_id.0.to_string())))?;
        entry.port.set_priority(priority).map_err(|e| {
            RegistryError::Preferences(e.to_string())
        })?;
        let key = format!("{}{}", entry.port.unique_id(), PRIORITY_VALUE_SUFFIX);
        drop(entry);
        self.prefs.lock().set(&key, priority.to_string());
        Ok(())
    }

    pub fn set_priority_mode(&self, port_id: PortId, mode: PriorityMode) -> Result<()> {
        let mut entry = self
            .ports
            .get_mut(&port_id)
            .ok_or_else(|| RegistryError::Core(dmxd_core::Error::PortUnknown(port_id.0.to_string())))?;
        entry.port.set_priority_mode(mode).map_err(|e| {
            RegistryError::Preferences(e.to_string())
        })?;
        let key = format!("{}{}", entry.port.unique_id(), PRIORITY_MODE_SUFFIX);
        let value = match mode {
            PriorityMode::Inherit => "inherit",
            PriorityMode::Override => "override",
        };
        drop(entry);
        self.prefs.lock().set(&key, value.to_string());
        Ok(())
    }

    /// Applies persisted priority value then mode — in that order, so that
    /// restoring `INHERIT` mode does not clobber a previously stored
    /// priority value (§4.3's restore-order invariant).
    fn restore_port_settings(&self, port: &mut dyn Port) {
        let prefs = self.prefs.lock();
        let value_key = format!("{}{}", port.unique_id(), PRIORITY_VALUE_SUFFIX);
        if let Some(v) = prefs.get(&value_key) {
            if let Ok(priority) = v.parse::<u8>() {
                let _ = port.set_priority(priority);
            }
        }
        let mode_key = format!("{}{}", port.unique_id(), PRIORITY_MODE_SUFFIX);
        if let Some(v) = prefs.get(&mode_key) {
            let mode = if v == "override" {
                PriorityMode::Override
            } else {
                PriorityMode::Inherit
            };
            let _ = port.set_priority_mode(mode);
        }
    }

    /// Sends a timecode frame to every timecode-capable output port, in
    /// registration order (§4.3).
    pub fn timecode_fanout_order(&self) -> Vec<PortId> {
        self.timecode_ports.read().clone()
    }

    pub fn with_port_mut<R>(&self, port_id: PortId, f: impl FnOnce(&mut dyn Port) -> R) -> Option<R> {
        self.ports.get_mut(&port_id).map(|mut e| f(e.port.as_mut()))
    }

    /// Pushes a freshly merged universe buffer to a single output port
    /// (§4.2 step 4's dispatch fan-out). The map guard is held across the
    /// `.await` — safe here because the registry is only ever driven from
    /// the daemon's single cooperative task (§5), so there is no concurrent
    /// writer to contend with the shard lock.
    pub async fn write_dmx(&self, port_id: PortId, buffer: &DmxBuffer) -> Result<()> {
        let mut entry = self
            .ports
            .get_mut(&port_id)
            .ok_or_else(|| RegistryError::Core(dmxd_core::Error::PortUnknown(port_id.0.to_string())))?;
        entry.port.write_dmx(buffer).await?;
        Ok(())
    }

    /// Every port currently patched to `universe`, split by kind, for
    /// callers that need to resolve output fan-out or input membership
    /// without reaching into `dmxd_core::Universe` directly.
    pub fn ports_for_universe(&self, universe: UniverseId) -> Vec<(PortId, dmxd_transport::PortKind)> {
        self.ports
            .iter()
            .filter(|e| e.universe == Some(universe))
            .map(|e| (*e.key(), e.port.kind()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryPreferences;
    use async_trait::async_trait;
    use dmxd_transport::{PortKind, PriorityCapability};

    struct FakePort {
        id: String,
        priority: u8,
        mode: PriorityMode,
    }

    #[async_trait]
    impl Port for FakePort {
        fn unique_id(&self) -> &str {
            &self.id
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
        fn set_priority(&mut self, priority: u8) -> dmxd_transport::Result<()> {
            self.priority = priority;
            Ok(())
        }
        fn priority_mode(&self) -> PriorityMode {
            self.mode
        }
        fn set_priority_mode(&mut self, mode: PriorityMode) -> dmxd_transport::Result<()> {
            self.mode = mode;
            Ok(())
        }
    }

    fn port(id: &str) -> Box<dyn Port> {
        Box::new(FakePort {
            id: id.to_string(),
            priority: 100,
            mode: PriorityMode::Inherit,
        })
    }

    #[test]
    fn alias_is_stable_across_unregister_reregister() {
        let registry = PortRegistry::new(Box::new(MemoryPreferences::new()));
        let alias_x = registry.register_device("X", "dev-x", vec![port("X:0")]).unwrap();
        let alias_y = registry.register_device("Y", "dev-y", vec![port("Y:0")]).unwrap();
        assert_ne!(alias_x, alias_y);

        registry.unregister_device("X");
        let alias_z = registry.register_device("Z", "dev-z", vec![port("Z:0")]).unwrap();
        assert_ne!(alias_z, alias_x);
        assert_ne!(alias_z, alias_y);

        let alias_x_again = registry.register_device("X", "dev-x", vec![port("X:0")]).unwrap();
        assert_eq!(alias_x_again, alias_x);
    }

    #[test]
    fn duplicate_live_registration_is_rejected() {
        let registry = PortRegistry::new(Box::new(MemoryPreferences::new()));
        registry.register_device("X", "dev-x", vec![port("X:0")]).unwrap();
        let err = registry.register_device("X", "dev-x", vec![port("X:0")]);
        assert!(err.is_err());
    }

    #[test]
    fn device_count_excludes_unregistered() {
        let registry = PortRegistry::new(Box::new(MemoryPreferences::new()));
        registry.register_device("X", "dev-x", vec![port("X:0")]).unwrap();
        assert_eq!(registry.device_count(), 1);
        registry.unregister_device("X");
        assert_eq!(registry.device_count(), 0);
    }

    #[tokio::test]
    async fn write_dmx_reaches_the_port() {
        let registry = PortRegistry::new(Box::new(MemoryPreferences::new()));
        registry.register_device("X", "dev-x", vec![port("X:0")]).unwrap();
        let port_id = registry.devices()[0].port_ids[0];
        registry
            .write_dmx(port_id, &dmxd_core::DmxBuffer::from_slice(&[1, 2, 3]))
            .await
            .unwrap();
    }

    #[test]
    fn patch_persists_and_unpatch_removes() {
        let registry = PortRegistry::new(Box::new(MemoryPreferences::new()));
        registry.register_device("X", "dev-x", vec![port("X:0")]).unwrap();
        let port_id = registry.devices()[0].port_ids[0];
        registry.patch(port_id, UniverseId::simple(3)).unwrap();
        assert_eq!(registry.universe_of(port_id), Some(UniverseId::simple(3)));
        registry.unpatch(port_id).unwrap();
        assert_eq!(registry.universe_of(port_id), None);
    }
}
