use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use tutor_core::model::SessionId;

/// Hands out one async mutex per session id.
///
/// State transitions on the same session are serialized by locking its entry
/// for the duration of the read-advance-write critical section; operations on
/// different sessions never contend. The registry itself is only locked long
/// enough to fetch or create an entry, never across an await point.
#[derive(Clone, Default)]
pub(crate) struct SessionLocks {
    inner: Arc<Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>>,
}

impl SessionLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The lock for one session, created on first use.
    pub(crate) fn lock_for(&self, id: SessionId) -> Arc<AsyncMutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(id).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_session_gets_same_lock() {
        let locks = SessionLocks::new();
        let id = SessionId::random();
        let a = locks.lock_for(id);
        let b = locks.lock_for(id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_sessions_get_independent_locks() {
        let locks = SessionLocks::new();
        let a = locks.lock_for(SessionId::random());
        let b = locks.lock_for(SessionId::random());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn lock_serializes_critical_sections() {
        let locks = SessionLocks::new();
        let id = SessionId::random();

        let lock = locks.lock_for(id);
        let guard = lock.lock_owned().await;

        let second = locks.lock_for(id);
        assert!(second.try_lock().is_err());

        drop(guard);
        assert!(second.try_lock().is_ok());
    }
}
