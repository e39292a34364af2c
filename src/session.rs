use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::store::ChunkStore;

/// identifies one upload session: a client-generated file id scoped
/// under a lesson (owner) id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub lesson_id: String,
    pub file_id: String,
}

impl SessionKey {
    pub fn new(lesson_id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            file_id: file_id.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.lesson_id, self.file_id)
    }
}

/// in-memory metadata for a session; the received set itself is implicit
/// in what the chunk store holds
#[derive(Debug, Clone)]
pub struct SessionMeta {
    /// last-declared total chunk count
    pub total_chunks: u32,
    pub last_activity: Instant,
}

/// tracks declared totals and recency per session, plus the per-session
/// advisory locks that serialize chunk writes against completion
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, SessionMeta>,
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// record a chunk arrival: update the declared total and touch activity
    ///
    /// a later declaration overwrites an earlier one; chunk 0 implicitly
    /// starts a fresh session so whatever total it declares wins
    pub fn declare(&self, key: &SessionKey, total_chunks: u32) {
        self.sessions.insert(
            key.clone(),
            SessionMeta {
                total_chunks,
                last_activity: Instant::now(),
            },
        );
    }

    pub fn declared_total(&self, key: &SessionKey) -> Option<u32> {
        self.sessions.get(key).map(|meta| meta.total_chunks)
    }

    /// strict completeness rule: every declared chunk is stored
    pub fn is_complete(&self, key: &SessionKey, stored_count: usize) -> bool {
        self.declared_total(key)
            .is_some_and(|total| stored_count == total as usize)
    }

    /// drop a session's metadata and its lock entry
    pub fn remove(&self, key: &SessionKey) {
        self.sessions.remove(key);
        self.locks.remove(key);
    }

    /// advisory lock for one session's critical section
    ///
    /// both chunk writes and the complete path hold this while touching
    /// the store, so a merge never interleaves with an in-flight write
    pub fn lock_for(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// sessions with no activity for at least `idle`
    pub fn idle_sessions(&self, idle: Duration) -> Vec<SessionKey> {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|entry| now.duration_since(entry.value().last_activity) >= idle)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// background task that purges abandoned sessions
///
/// an upload that stalls mid-sequence would otherwise leave its chunk
/// directory around forever; the sweeper reclaims it once the session has
/// been idle past the configured timeout
pub fn spawn_idle_sweeper(
    sessions: Arc<SessionRegistry>,
    store: Arc<ChunkStore>,
    idle: Duration,
) -> JoinHandle<()> {
    // check at half the timeout, with a floor so tiny timeouts don't spin
    let period = (idle / 2).max(Duration::from_millis(10));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            for key in sessions.idle_sessions(idle) {
                let lock = sessions.lock_for(&key);
                let _guard = lock.lock().await;
                match store.purge(&key.lesson_id, &key.file_id).await {
                    Ok(()) => {
                        sessions.remove(&key);
                        tracing::info!("🧹 Purged idle upload session {}", key);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to purge idle session {}: {}", key, e);
                    }
                }
            }
        }
    })
}
