use std::cmp::Ordering;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

pub(crate) struct TimerEntry {
    pub id: TimerId,
    pub fire_at: Instant,
    pub interval: Option<Duration>,
    pub callback: Box<dyn FnMut() -> bool + Send>,
}

impl TimerEntry {
    pub(crate) fn repeating(&self) -> bool {
        self.interval.is_some()
    }
}

/// Ordered so that a `BinaryHeap<TimerEntry>` is a min-heap on `fire_at`,
/// with ties broken by insertion order (`id`) to give same-instant timers a
/// stable, deterministic firing order as required by §4.1.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.id == other.id
    }
}

impl Eq for TimerEntry {}
