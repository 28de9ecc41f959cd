//! Thread-keyed callback routing.
//!
//! Core callbacks carry no user data, so a trampoline finds "its" session by asking
//! which context is registered for the calling thread. The registry lock is held only
//! for the lookup; the context lock is taken with `try_lock` so a callback that arrives
//! while the host holds the context gets a neutral answer instead of a deadlock.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use super::SessionContext;
use crate::error::SessionError;

pub type SharedContext = Arc<Mutex<SessionContext>>;

lazy_static! {
    static ref SESSIONS: Mutex<HashMap<ThreadId, SharedContext>> = Mutex::new(HashMap::new());
}

/// Bind `context` to the calling thread.
pub fn register(context: SharedContext) -> Result<(), SessionError> {
    let id = thread::current().id();
    let mut sessions = SESSIONS.lock();
    if sessions.contains_key(&id) {
        return Err(SessionError::ThreadOccupied);
    }
    sessions.insert(id, context);
    tracing::trace!(thread = ?id, "session registered");
    Ok(())
}

/// Remove `context` wherever it is registered. Other sessions' entries are left alone.
pub fn unregister(context: &SharedContext) -> bool {
    let mut sessions = SESSIONS.lock();
    let before = sessions.len();
    sessions.retain(|_, registered| !Arc::ptr_eq(registered, context));
    let removed = sessions.len() != before;
    if removed {
        tracing::trace!("session unregistered");
    }
    removed
}

/// Context registered for the calling thread.
pub fn current() -> Option<SharedContext> {
    SESSIONS.lock().get(&thread::current().id()).cloned()
}

/// Run `f` against the calling thread's context. `None` when no session is registered
/// here or its context is already locked.
pub fn with_current<R>(f: impl FnOnce(&mut SessionContext) -> R) -> Option<R> {
    let context = current()?;
    let Some(mut guard) = context.try_lock() else {
        tracing::trace!("session context busy, dropping callback");
        return None;
    };
    Some(f(&mut guard))
}
