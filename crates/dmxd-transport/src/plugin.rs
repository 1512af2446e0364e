use async_trait::async_trait;

use crate::error::Result;
use crate::port::Port;

/// A transport implementation (Art-Net, in this workspace; the trait is the
/// contract any future plugin — E1.31, a USB widget driver — binds to).
///
/// Plugins own their devices and ports; the registry only ever sees the
/// `unique_id`s and `Port` trait objects a plugin hands it on registration.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable numeric identifier for preferences namespacing and logging.
    fn id(&self) -> u32;

    fn name(&self) -> &str;

    fn description(&self) -> String {
        String::new()
    }

    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// A single hardware/software unit a plugin registers with the device
/// registry, per §3's `Device`.
pub struct DeviceDescriptor {
    pub unique_id: String,
    pub name: String,
    pub ports: Vec<Box<dyn Port>>,
}
