use std::time::{Duration, Instant};

/// A monotonic timestamp. Wraps `Instant` rather than wall-clock time so
/// that aging comparisons (`MERGE_TIMEOUT`, `NODE_TIMEOUT`, ...) are immune
/// to clock adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(Instant);

impl Timestamp {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    pub fn elapsed_since(&self, earlier: Timestamp) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }

    pub fn is_older_than(&self, now: Timestamp, max_age: Duration) -> bool {
        now.elapsed_since(*self) > max_age
    }

    pub fn into_instant(self) -> Instant {
        self.0
    }
}

impl From<Instant> for Timestamp {
    fn from(i: Instant) -> Self {
        Self(i)
    }
}

/// `MERGE_TIMEOUT` from the Art-Net specification: a merge source that has
/// not refreshed in this long is dropped from the active set.
pub const MERGE_TIMEOUT: Duration = Duration::from_secs(10);

/// `NODE_TIMEOUT`: a remote Art-Net node is considered unsubscribed if it
/// has not PollReplied in this long.
pub const NODE_TIMEOUT: Duration = Duration::from_secs(31);
