use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

/// A readiness-driven descriptor registered with the reactor. Implementors
/// wrap a non-blocking handle (typically a `tokio::net::UdpSocket`); `ready`
/// resolves once the handle has data (or write capacity) available and
/// `on_readable` performs the actual non-blocking I/O.
///
/// `on_readable` must not block: it is invoked on the reactor's own thread
/// between waits, per §4.1's cooperative contract.
#[async_trait]
pub trait Source: Send {
    async fn ready(&self) -> std::io::Result<()>;

    fn on_readable(&mut self);
}
