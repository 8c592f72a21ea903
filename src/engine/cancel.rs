//! Cooperative cancellation for loads and translations.
//!
//! A token/handle pair is created per operation: the engine polls the token
//! at its suspension points, the caller keeps the handle and flips it to
//! request a stop. Cancellation is advisory; the operation finishes its
//! current step, discards its work, and reports
//! [`EngineError::Cancelled`](crate::engine::EngineError::Cancelled).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The engine-side half of a cancellation pair. Cheap to clone; all clones
/// observe the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

/// The caller-side half. Dropping the handle does not cancel; only
/// [`cancel`](CancellationHandle::cancel) does.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a fresh pair for one operation.
    pub fn new() -> (CancellationToken, CancellationHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            CancellationToken { flag: Arc::clone(&flag) },
            CancellationHandle { flag },
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl CancellationHandle {
    /// Requests cancellation. Idempotent; observed by every token clone.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
