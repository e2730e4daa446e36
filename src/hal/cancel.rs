use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Operator cancel flag, polled once per classifier loop iteration.
///
/// Clones share the same flag, so the handle given to a signal handler
/// cancels every wait that holds another clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
