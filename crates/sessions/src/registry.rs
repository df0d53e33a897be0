//! In-process per-session exclusive-writer locks, activity timers, and the
//! session-status clock (§4.2).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sa_domain::error::{Error, Result};
use sa_store::model::SessionPatch;
use sa_store::{PersistentStore, SessionStatus};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Exclusive-writer handle for one session. Held across the full turn
/// pipeline — persist user message, route, assemble context, stream, persist
/// assistant message — and released on drop, including on early return or
/// client disconnect.
pub struct SessionHandle {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug)]
pub struct SessionBusy;

impl std::fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session is busy — a turn is already in progress")
    }
}

impl std::error::Error for SessionBusy {}

/// Handle to an in-flight debounced inactivity timer. `reset()` cancels the
/// previous sleep (if it hasn't fired yet) and starts a new one.
struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

pub struct SessionRegistry {
    store: Arc<PersistentStore>,
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
    timers: Mutex<HashMap<String, TimerHandle>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the exclusive-writer lock for a session. Concurrent callers
    /// for the same id queue FIFO on the underlying semaphore.
    pub async fn acquire(&self, session_id: &str) -> std::result::Result<SessionHandle, SessionBusy> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(session_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        let permit = sem.acquire_owned().await.map_err(|_| SessionBusy)?;
        Ok(SessionHandle { _permit: permit })
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop lock entries for sessions with no outstanding permit. Call
    /// periodically to bound the lock map's memory.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, sem| sem.available_permits() == 0);
    }

    /// Debounced transition to `inactive` after `after_ms` of no activity.
    /// Each call cancels any previously scheduled timer for this session and
    /// reschedules — exactly one timer is outstanding per active session.
    pub fn schedule_inactivity_transition(self: &Arc<Self>, session_id: &str, after_ms: u64) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let previous = self.timers.lock().insert(
            session_id.to_owned(),
            TimerHandle {
                cancelled: cancelled.clone(),
            },
        );
        if let Some(prev) = previous {
            prev.cancelled.store(true, Ordering::SeqCst);
        }

        let registry = self.clone();
        let session_id = session_id.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = registry
                .store
                .update_session(
                    &session_id,
                    SessionPatch {
                        status: Some(SessionStatus::Inactive),
                        ..Default::default()
                    },
                )
                .await
            {
                tracing::warn!(error = %e, session_id, "inactivity transition failed");
            }
        });
    }

    /// Cancel any outstanding timer and mark the session `deleted` (soft
    /// delete — callers needing a hard delete should go through
    /// `PersistentStore::hard_delete_session` directly).
    pub async fn mark_deleted(&self, session_id: &str) -> Result<()> {
        self.cancel_timer(session_id);
        self.store
            .update_session(
                session_id,
                SessionPatch {
                    status: Some(SessionStatus::Deleted),
                    ..Default::default()
                },
            )
            .await
            .map(|_| ())
            .map_err(|e| Error::Storage(e.to_string()))
    }

    /// Cancel any outstanding timer and mark the session `archived`.
    pub async fn mark_archived(&self, session_id: &str) -> Result<()> {
        self.cancel_timer(session_id);
        self.store
            .update_session(
                session_id,
                SessionPatch {
                    status: Some(SessionStatus::Archived),
                    ..Default::default()
                },
            )
            .await
            .map(|_| ())
            .map_err(|e| Error::Storage(e.to_string()))
    }

    fn cancel_timer(&self, session_id: &str) {
        if let Some(t) = self.timers.lock().remove(session_id) {
            t.cancelled.store(true, Ordering::SeqCst);
        }
    }
}
