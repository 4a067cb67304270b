//! Cooperative cancellation (spec §4.1, §5).
//!
//! `$/cancelRequest` marks a request id as cancelled; handlers poll their
//! token at each suspension point and unwind. Grounded on the teacher's
//! `CancellationToken` newtype-over-`Arc<AtomicBool>` pattern, generalized
//! to a registry keyed by the MCP `RequestId` rather than the teacher's
//! job-id namespace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::protocol::RequestId;

/// A single request's cancellation flag. Cheap to clone; all clones observe
/// the same underlying state.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Registry of in-flight request tokens, keyed by request id. The session
/// engine registers a token when a handler starts and removes it when the
/// handler finishes; `$/cancelRequest` looks the id up and flips its flag.
#[derive(Default, Clone)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<HashMap<RequestId, CancellationToken>>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh token for `id`, replacing any stale entry.
    pub fn register(&self, id: RequestId) -> CancellationToken {
        let token = CancellationToken::new();
        self.inner.lock().unwrap().insert(id, token.clone());
        token
    }

    pub fn unregister(&self, id: &RequestId) {
        self.inner.lock().unwrap().remove(id);
    }

    /// Marks `id` cancelled if it is currently in flight; a no-op on
    /// unknown ids (the handler may have already completed).
    pub fn cancel(&self, id: &RequestId) {
        if let Some(token) = self.inner.lock().unwrap().get(id) {
            token.cancel();
        }
    }
}
