use dmxd_core::PortId;

/// A registered device: one or more ports, grouped under a plugin-chosen
/// `unique_id` and a process-stable numeric `alias`.
#[derive(Debug, Clone)]
pub struct Device {
    pub unique_id: String,
    pub alias: u32,
    pub name: String,
    pub port_ids: Vec<PortId>,
}

/// Reserved alias meaning "no device" — never assigned to a real device.
pub const MISSING_DEVICE_ALIAS: u32 = 0;
