use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// event delivered on a registered progress channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// `"Initialising"` or `"<percent> %"`
    Progress(String),
    Complete,
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

#[derive(Debug, Clone)]
struct Binding {
    connection_id: Uuid,
    sender: ProgressSender,
}

/// maps a file id to the live connection interested in its progress
///
/// owned by `AppState` and handed to the websocket layer explicitly; empty
/// at process start, entries dropped when their connection goes away. one
/// connection may hold bindings for several file ids.
#[derive(Debug, Default)]
pub struct ProgressChannels {
    bindings: DashMap<String, Binding>,
}

impl ProgressChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// bind (or rebind) a file id to a connection; last registration wins
    pub fn register(&self, file_id: &str, connection_id: Uuid, sender: ProgressSender) {
        tracing::debug!("Registered progress channel for {} on {}", file_id, connection_id);
        self.bindings.insert(
            file_id.to_string(),
            Binding {
                connection_id,
                sender,
            },
        );
    }

    /// sender for a file id, if a live binding exists
    pub fn resolve(&self, file_id: &str) -> Option<ProgressSender> {
        self.bindings.get(file_id).map(|b| b.sender.clone())
    }

    pub fn is_bound(&self, file_id: &str) -> bool {
        self.bindings.contains_key(file_id)
    }

    /// drop every binding held by a disconnecting connection
    pub fn unregister_connection(&self, connection_id: Uuid) -> usize {
        let before = self.bindings.len();
        self.bindings
            .retain(|_, binding| binding.connection_id != connection_id);
        let removed = before - self.bindings.len();
        if removed > 0 {
            tracing::debug!("Dropped {} binding(s) for connection {}", removed, connection_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// pacing of the simulated remote-transfer stream
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// percentage added per event, 1..=100
    pub step_percent: u8,
    /// delay between consecutive events
    pub step_delay: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            step_percent: 10,
            step_delay: Duration::from_millis(400),
        }
    }
}

/// emit the remote-transfer progress stream for a file id on its bound
/// channel, as a detached task
///
/// the stream is one `Initialising` event, percentages stepping from 0 to
/// 100 separated by the configured delay, then a terminal complete event.
/// an unbound file id is a no-op, and a send failure (the connection went
/// away mid-stream) cancels the remainder; nothing is buffered or
/// replayed.
pub fn spawn_remote_transfer(
    channels: Arc<ProgressChannels>,
    file_id: String,
    config: BroadcastConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(sender) = channels.resolve(&file_id) else {
            tracing::debug!("No progress channel bound for {}, skipping stream", file_id);
            return;
        };

        if sender
            .send(ProgressEvent::Progress("Initialising".to_string()))
            .is_err()
        {
            return;
        }

        let step = config.step_percent.max(1) as u32;
        let mut percent: u32 = 0;
        loop {
            tokio::time::sleep(config.step_delay).await;
            if sender
                .send(ProgressEvent::Progress(format!("{} %", percent)))
                .is_err()
            {
                tracing::debug!("Progress channel for {} closed mid-stream", file_id);
                return;
            }
            if percent >= 100 {
                break;
            }
            percent = (percent + step).min(100);
        }

        if sender.send(ProgressEvent::Complete).is_err() {
            return;
        }
        tracing::debug!("Remote-transfer stream for {} finished", file_id);
    })
}
