use std::path::PathBuf;
use std::sync::Arc;

use crate::progress::{BroadcastConfig, ProgressChannels};
use crate::session::SessionRegistry;
use crate::store::ChunkStore;

/// shared application state
#[derive(Clone)]
pub struct AppState {
    /// on-disk chunk storage
    pub store: Arc<ChunkStore>,
    /// per-session metadata and advisory locks
    pub sessions: Arc<SessionRegistry>,
    /// file id → live progress channel bindings
    pub progress: Arc<ProgressChannels>,
    /// pacing for the simulated remote-transfer stream
    pub broadcast: BroadcastConfig,
}

impl AppState {
    /// create a new app state rooted at the given storage directory
    pub fn new(storage_root: PathBuf, broadcast: BroadcastConfig) -> Self {
        Self {
            store: Arc::new(ChunkStore::new(storage_root)),
            sessions: Arc::new(SessionRegistry::new()),
            progress: Arc::new(ProgressChannels::new()),
            broadcast,
        }
    }
}
