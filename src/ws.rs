use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::progress::{ProgressChannels, ProgressEvent, ProgressSender};
use crate::state::AppState;
use crate::utils::sanitize_id;

/// client → server messages on the progress channel
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    RegisterUpload { file_id: String },
}

/// server → client messages on the progress channel
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    UploadProgress { message: String },
    #[serde(rename_all = "camelCase")]
    UploadComplete { value: bool },
}

impl From<ProgressEvent> for ServerMessage {
    fn from(event: ProgressEvent) -> Self {
        match event {
            ProgressEvent::Progress(message) => ServerMessage::UploadProgress { message },
            ProgressEvent::Complete => ServerMessage::UploadComplete { value: true },
        }
    }
}

/// apply a parsed client message to the channel registry
///
/// the file id goes through the same normalization as the HTTP trigger
/// path, so the binding and the later lookup always agree on the key
pub fn apply_client_message(
    channels: &ProgressChannels,
    connection_id: Uuid,
    message: ClientMessage,
    sender: ProgressSender,
) {
    match message {
        ClientMessage::RegisterUpload { file_id } => {
            channels.register(&sanitize_id(&file_id), connection_id, sender);
        }
    }
}

/// upgrade handler for the persistent progress channel
pub async fn upload_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::debug!("Progress channel connected: {}", connection_id);

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let (mut sink, mut stream) = socket.split();

    // drain broadcast events into the socket as json
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let message = ServerMessage::from(event);
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let channels = state.progress.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => {
                        apply_client_message(&channels, connection_id, message, tx.clone());
                    }
                    Err(e) => {
                        tracing::warn!("Unparseable message on progress channel: {}", e);
                    }
                },
                Message::Close(_) => break,
                // pings are answered by axum, other frames carry nothing for us
                _ => {}
            }
        }
    });

    // whichever half dies first takes the other with it
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let removed = state.progress.unregister_connection(connection_id);
    tracing::debug!(
        "Progress channel disconnected: {} ({} binding(s) dropped)",
        connection_id,
        removed
    );
}
