use std::collections::{BinaryHeap, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::source::{Source, SourceId};
use crate::timer::{TimerEntry, TimerId};

type ReadyCallback = Box<dyn FnMut() + Send>;

/// The single-threaded cooperative event loop described in §4.1.
///
/// `Reactor::run` owns the process's only suspension point: the readiness
/// wait in step 2 of the loop contract. Everything else — ready-queue
/// drains, descriptor callbacks, timer callbacks — executes synchronously
/// on the calling task and is expected to return promptly.
pub struct Reactor {
    sources: Vec<(SourceId, Box<dyn Source>)>,
    next_source_id: u64,
    timers: BinaryHeap<TimerEntry>,
    next_timer_id: u64,
    cancelled_timers: std::collections::HashSet<TimerId>,
    ready_queue: VecDeque<ReadyCallback>,
    terminated: bool,
}

impl Reactor {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            next_source_id: 1,
            timers: BinaryHeap::new(),
            next_timer_id: 1,
            cancelled_timers: std::collections::HashSet::new(),
            ready_queue: VecDeque::new(),
            terminated: false,
        }
    }

    /// Registers a descriptor. Returns an id usable with [`Reactor::remove_source`].
    pub fn add_source(&mut self, source: Box<dyn Source>) -> SourceId {
        let id = SourceId(self.next_source_id);
        self.next_source_id += 1;
        self.sources.push((id, source));
        id
    }

    pub fn remove_source(&mut self, id: SourceId) {
        self.sources.retain(|(sid, _)| *sid != id);
    }

    /// Schedules `callback` to run once, `delay` from now. A zero delay
    /// enqueues it on the ready queue, drained before the next readiness
    /// wait — this is the mechanism callbacks use to defer work rather than
    /// block.
    pub fn register_single_timeout<F>(&mut self, delay: Duration, callback: F) -> TimerId
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.schedule(delay, None, callback)
    }

    /// Schedules `callback` to run every `interval`, starting one interval
    /// from now. The callback's return value controls whether it
    /// continues: returning `false` cancels the timer instead of
    /// reinserting it.
    pub fn register_repeating_timeout<F>(&mut self, interval: Duration, callback: F) -> TimerId
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.schedule(interval, Some(interval), callback)
    }

    fn schedule<F>(&mut self, delay: Duration, interval: Option<Duration>, callback: F) -> TimerId
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;
        self.timers.push(TimerEntry {
            id,
            fire_at: Instant::now() + delay,
            interval,
            callback: Box::new(callback),
        });
        id
    }

    /// Cancels a timer by id. Safe to call after the timer has already
    /// fired — the cancel is silently ignored in that case (§4.1).
    pub fn cancel_timer(&mut self, id: TimerId) {
        self.cancelled_timers.insert(id);
    }

    /// Enqueues a zero-delay callback on the ready queue.
    pub fn defer<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.ready_queue.push_back(Box::new(callback));
    }

    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Runs the loop until `terminate()` is called. Each iteration drains
    /// the ready queue, waits for the next timer deadline or descriptor
    /// readiness (whichever comes first), services whatever became ready,
    /// and fires any timers now due.
    pub async fn run(&mut self) -> Result<()> {
        while !self.terminated {
            self.drain_ready_queue();
            if self.terminated {
                break;
            }

            self.wait_for_readiness().await?;
            self.fire_due_timers();
        }
        debug!("reactor terminated");
        Ok(())
    }

    fn drain_ready_queue(&mut self) {
        while let Some(mut cb) = self.ready_queue.pop_front() {
            cb();
            if self.terminated {
                return;
            }
        }
    }

    async fn wait_for_readiness(&mut self) -> Result<()> {
        let deadline = self
            .timers
            .peek()
            .map(|t| t.fire_at)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(1));

        let sleep = tokio::time::sleep_until(deadline.into());
        tokio::pin!(sleep);

        if self.sources.is_empty() {
            sleep.await;
            return Ok(());
        }

        let ready_futs: Vec<_> = self
            .sources
            .iter()
            .map(|(_, s)| s.ready())
            .collect();

        tokio::select! {
            _ = &mut sleep => {}
            (result, idx, _remaining) = futures::future::select_all(ready_futs) => {
                match result {
                    Ok(()) => {
                        trace!(idx, "descriptor ready");
                        self.sources[idx].1.on_readable();
                    }
                    Err(e) => warn!(error = %e, "descriptor readiness wait failed"),
                }
            }
        }
        Ok(())
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();
        while let Some(top) = self.timers.peek() {
            if top.fire_at > now {
                break;
            }
            let mut entry = self.timers.pop().unwrap();
            if self.cancelled_timers.remove(&entry.id) {
                continue;
            }
            let keep = (entry.callback)();
            if entry.repeating() && keep {
                entry.fire_at = now + entry.interval.unwrap();
                self.timers.push(entry);
            }
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn single_timeout_fires_once() {
        let mut reactor = Reactor::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        reactor.register_single_timeout(Duration::from_millis(5), move || {
            count2.fetch_add(1, Ordering::SeqCst);
            false
        });
        let count3 = count.clone();
        reactor.register_single_timeout(Duration::from_millis(10), move || {
            count3.fetch_add(1, Ordering::SeqCst);
            false
        });
        // A third timer terminates the loop once both have fired.
        reactor.register_single_timeout(Duration::from_millis(20), || true);
        let r = tokio::time::timeout(Duration::from_millis(100), async {
            let mut iterations = 0;
            while count.load(Ordering::SeqCst) < 2 && iterations < 50 {
                reactor.drain_ready_queue();
                reactor.wait_for_readiness().await.unwrap();
                reactor.fire_due_timers();
                iterations += 1;
            }
        })
        .await;
        assert!(r.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_timer_does_not_fire() {
        let mut reactor = Reactor::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        let id = reactor.register_single_timeout(Duration::from_millis(10), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
            false
        });
        reactor.cancel_timer(id);
        tokio::time::sleep(Duration::from_millis(20)).await;
        reactor.fire_due_timers();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn defer_runs_before_next_wait() {
        let mut reactor = Reactor::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();
        reactor.defer(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        });
        reactor.drain_ready_queue();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
