//! Test helpers shared across the workspace's integration suites (§10.8):
//! condition-based waiting in place of hardcoded sleeps, UDP port
//! allocation for Art-Net node tests, and a generic value collector for
//! draining a channel under test.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::time::timeout;

/// Default condition timeout for test waits.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default polling interval for [`wait_for`].
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Finds an available UDP port by binding ephemeral port 0 and reading it
/// back, then releasing the socket. Used by Art-Net node tests that need a
/// real bound address (loopback) without colliding with other tests.
pub fn find_available_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

/// Finds an available TCP port, same rationale as
/// [`find_available_udp_port`] for transports that bind TCP.
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Polls `check` at `interval` until it returns true or `max_wait`
/// elapses. Condition-based waiting avoids the flakiness of a fixed sleep
/// racing against a background task (a reactor tick, a UDP receive loop).
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Waits for an atomic counter to reach at least `target`.
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || async { counter.load(Ordering::SeqCst) >= target },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Waits for a boolean flag to become true.
pub async fn wait_for_flag(flag: &AtomicBool, max_wait: Duration) -> bool {
    wait_for(
        || async { flag.load(Ordering::SeqCst) },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Waits on a `Notify`, bounded by `max_wait` rather than blocking forever.
pub async fn wait_with_notify(notify: &Notify, max_wait: Duration) -> bool {
    timeout(max_wait, notify.notified()).await.is_ok()
}

/// Collects values pushed from a background task (a `Service` dispatch, a
/// reactor callback) with a notify-on-push so tests can await arrival
/// instead of polling a fixed number of times.
#[derive(Clone)]
pub struct ValueCollector<T: Clone + Send + 'static> {
    values: Arc<parking_lot::Mutex<Vec<T>>>,
    notify: Arc<Notify>,
    count: Arc<AtomicU32>,
}

impl<T: Clone + Send + 'static> ValueCollector<T> {
    pub fn new() -> Self {
        Self {
            values: Arc::new(parking_lot::Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn push(&self, value: T) {
        self.values.lock().push(value);
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub async fn wait_for_count(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.count, n, max_wait).await
    }

    pub fn values(&self) -> Vec<T> {
        self.values.lock().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.values.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.values.lock().clear();
        self.count.store(0, Ordering::SeqCst);
    }
}

impl<T: Clone + Send + 'static> Default for ValueCollector<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_for_returns_true_once_condition_flips() {
        let flag = AtomicBool::new(false);
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        flag.store(true, Ordering::SeqCst);
        let _ = handle.await;
        assert!(wait_for_flag(&flag, DEFAULT_TIMEOUT).await);
    }

    #[tokio::test]
    async fn wait_for_times_out_when_condition_never_holds() {
        let flag = AtomicBool::new(false);
        assert!(!wait_for_flag(&flag, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn value_collector_notifies_waiters_on_push() {
        let collector: ValueCollector<u32> = ValueCollector::new();
        let c2 = collector.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            c2.push(42);
        });
        assert!(collector.wait_for_count(1, DEFAULT_TIMEOUT).await);
        assert_eq!(collector.last(), Some(42));
    }

    #[test]
    fn udp_port_allocation_yields_a_bindable_port() {
        let port = find_available_udp_port();
        assert!(port > 0);
    }
}
