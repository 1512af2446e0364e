use thiserror::Error;

/// Error taxonomy shared by every crate in the workspace.
///
/// Variants are grouped by the propagation policy a caller should apply:
/// `NotFound`/`Conflict`/`Invalid` are returned synchronously to the
/// operation that triggered them, `Transient` errors are delivered to the
/// originating async callback (RDM, discovery), and `Fatal` terminates the
/// reactor loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("universe {0:?} does not exist")]
    UniverseMissing(crate::id::UniverseId),

    #[error("port {0} is unknown")]
    PortUnknown(String),

    #[error("uid {0} is unknown on this universe")]
    UidUnknown(String),

    #[error("device {0} is already registered")]
    DeviceAlreadyRegistered(String),

    #[error("an RDM request is already in flight on this port")]
    RdmInFlight,

    #[error("RDM discovery is already in progress on this port")]
    DiscoveryInProgress,

    #[error("port id {0} is out of range")]
    PortIdOutOfRange(u8),

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("unsupported protocol version {0}")]
    VersionMismatch(u8),

    #[error("priority {0} is out of range (0-200)")]
    PriorityOutOfRange(u8),

    #[error("operation timed out")]
    Timeout,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("reactor wait failed: {0}")]
    WaitFailed(String),
}

impl Error {
    /// True for errors that should be logged and swallowed rather than
    /// propagated to an initiator (malformed inbound packets, for example).
    pub fn is_silent(&self) -> bool {
        matches!(self, Error::MalformedPacket(_) | Error::VersionMismatch(_))
    }

    /// True for the one class of error that should terminate the reactor.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::WaitFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
