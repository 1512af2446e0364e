//! `QueueingRdmController` (grounded in OLA's `ArtNetNodeImplRDMWrapper` +
//! `QueueingRDMController` pair): only one RDM request may be in flight per
//! output port at a time, so later callers queue behind it rather than
//! racing the wire.

use std::collections::VecDeque;

use crate::rdm::{RdmOutcome, RdmRequest};

type Callback = Box<dyn FnOnce(RdmOutcome) + Send>;

struct Pending {
    request: RdmRequest,
    callback: Callback,
}

/// One queue per output port id. The front of `queue` is the request
/// currently on the wire once `submit` hands it back to the caller.
#[derive(Default)]
pub struct QueueingRdmController {
    queue: VecDeque<Pending>,
    sent: bool,
}

impl QueueingRdmController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.sent
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Submits a request. If nothing is in flight it is handed back
    /// immediately for the caller to actually send; otherwise it's queued
    /// and `None` is returned, to be dispatched once its turn comes up.
    pub fn submit(&mut self, request: RdmRequest, callback: Callback) -> Option<RdmRequest> {
        let send_now = !self.sent;
        self.queue.push_back(Pending { request: request.clone(), callback });
        if send_now {
            self.sent = true;
            Some(request)
        } else {
            None
        }
    }

    /// Completes whatever is currently in flight and, if anything is
    /// queued behind it, returns the next request to send.
    pub fn complete(&mut self, outcome: RdmOutcome) -> Option<RdmRequest> {
        if let Some(done) = self.queue.pop_front() {
            (done.callback)(outcome);
        }
        self.sent = false;
        if let Some(next) = self.queue.front() {
            self.sent = true;
            Some(next.request.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uid::Uid;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request() -> RdmRequest {
        RdmRequest {
            transaction_number: 0,
            port_id: 0,
            source_uid: Uid::new(0x4850, 1),
            dest_uid: Uid::new(0x4850, 2),
            sub_device: 0,
            command_class: crate::rdm::CommandClass::GetCommand,
            param_id: 0x0060,
            param_data: vec![],
        }
    }

    #[test]
    fn second_submission_queues_behind_the_first() {
        let mut ctrl = QueueingRdmController::new();
        assert!(ctrl.submit(request(), Box::new(|_| {})).is_some());
        assert!(ctrl.submit(request(), Box::new(|_| {})).is_none());
        assert_eq!(ctrl.queue_len(), 2);
        assert!(ctrl.is_busy());
    }

    #[test]
    fn completing_dispatches_the_next_queued_request() {
        let mut ctrl = QueueingRdmController::new();
        let completed = Arc::new(AtomicUsize::new(0));
        let c1 = completed.clone();
        ctrl.submit(request(), Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        ctrl.submit(request(), Box::new(|_| {}));
        let next = ctrl.complete(RdmOutcome::Timeout);
        assert!(next.is_some());
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert!(ctrl.is_busy());
        assert!(ctrl.complete(RdmOutcome::Timeout).is_none());
        assert!(!ctrl.is_busy());
    }
}
