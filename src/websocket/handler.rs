use crate::{
    game::{
        items::ItemCatalog,
        session::{run_session, SessionCommand},
    },
    models::PointerInput,
    websocket::messages::{ClientMessage, ServerMessage},
    AppState, SessionEntry,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

/// WebSocket upgrade handler; every connection gets its own game session.
pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (update_tx, mut update_rx) = mpsc::channel::<ServerMessage>(100);
    let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(32);

    tracing::info!("Session {} connected", session_id);

    // The driver owns the engine and all of its timers; it stops when the
    // command channel closes or the cleanup task aborts it.
    let driver = tokio::spawn(run_session(
        state.config.game.clone(),
        ItemCatalog::standard(),
        command_rx,
        update_tx.clone(),
    ));
    state.sessions.insert(
        session_id,
        SessionEntry {
            started_at: Instant::now(),
            driver,
        },
    );

    // Spawn a task to send messages to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = update_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                }
            }
        }
    });

    // Handle incoming messages from the client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        let cmd = command_for(client_msg);
                        if command_tx.send(cmd).await.is_err() {
                            // Driver is gone (evicted or crashed).
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse message: {}", e);
                        let error_msg = ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        };
                        let _ = update_tx.send(error_msg).await;
                    }
                },
                Message::Close(_) => {
                    tracing::info!("Session {} client disconnected", session_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    // Drop the registry entry and stop the driver with it.
    if let Some((_, entry)) = state.sessions.remove(&session_id) {
        entry.driver.abort();
    }

    tracing::info!("Session {} closed", session_id);
}

fn command_for(msg: ClientMessage) -> SessionCommand {
    match msg {
        ClientMessage::StartGame => SessionCommand::Start,
        ClientMessage::Grab => SessionCommand::Grab,
        ClientMessage::MoveCursor {
            x,
            y,
            width,
            height,
        } => SessionCommand::MoveCursor(PointerInput {
            x,
            y,
            width,
            height,
        }),
    }
}
