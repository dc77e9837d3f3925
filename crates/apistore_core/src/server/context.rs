//! Per-request caller context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Authenticated principal issuing a request.
///
/// Authentication happens upstream; the core only records the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
}

impl CallerIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Caller identity plus a cancellation flag shared with the caller.
#[derive(Debug, Clone)]
pub struct RequestContext {
    caller: CallerIdentity,
    cancelled: Arc<AtomicBool>,
}

/// Handle used to abandon an in-flight request.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl RequestContext {
    pub fn new(caller: CallerIdentity) -> Self {
        Self {
            caller,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
