//! Single-threaded cooperative reactor: descriptor readiness, a timer
//! min-heap, and a ready queue of deferred zero-delay callbacks.

mod error;
mod reactor;
mod source;
mod timer;

pub use error::{ReactorError, Result};
pub use reactor::Reactor;
pub use source::{Source, SourceId};
pub use timer::TimerId;
