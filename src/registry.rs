//! Session handle registry
//!
//! Sessions cross the external boundary as opaque non-negative integer
//! handles. The registry is a process-global table from handle to
//! session; handles are allocated from a monotonically increasing
//! counter and never reused, so a released handle can never silently
//! alias a newer session. Each session sits behind its own lock:
//! operations on different handles proceed independently, while calls
//! against one handle serialize.
//!
//! `release` is idempotent: releasing an unknown or already-released
//! handle is a no-op. Every other operation on a released handle fails
//! with `InvalidHandle`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::core::{Result, SvmError};
use crate::session::Session;

struct RegistryInner {
    next_handle: i32,
    sessions: HashMap<i32, Arc<Mutex<Session>>>,
}

fn registry() -> &'static Mutex<RegistryInner> {
    static REGISTRY: OnceLock<Mutex<RegistryInner>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Mutex::new(RegistryInner {
            next_handle: 0,
            sessions: HashMap::new(),
        })
    })
}

/// Register a session and return its handle.
pub fn create(session: Session) -> i32 {
    let mut inner = registry().lock().unwrap_or_else(PoisonError::into_inner);
    let handle = inner.next_handle;
    inner.next_handle += 1;
    inner.sessions.insert(handle, Arc::new(Mutex::new(session)));
    handle
}

/// Run an operation against a live session.
pub fn with_session<T>(handle: i32, op: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
    let session = {
        let inner = registry().lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .sessions
            .get(&handle)
            .cloned()
            .ok_or(SvmError::InvalidHandle(handle))?
    };
    // The registry lock is dropped before the session lock is taken, so
    // long-running calls on one handle never block other handles.
    let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
    op(&mut session)
}

/// Release a session. Safe to call repeatedly and for unknown handles.
pub fn release(handle: i32) {
    let mut inner = registry().lock().unwrap_or_else(PoisonError::into_inner);
    inner.sessions.remove(&handle);
}

/// Whether a handle currently resolves to a session.
pub fn is_live(handle: i32) -> bool {
    let inner = registry().lock().unwrap_or_else(PoisonError::into_inner);
    inner.sessions.contains_key(&handle)
}
