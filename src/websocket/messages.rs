use serde::{Deserialize, Serialize};

use crate::models::{CatchResult, SessionSnapshot};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    StartGame,
    Grab,
    /// Raw pointer offset within the grid plus the grid's on-screen size in
    /// pixels; the engine maps it to a cell.
    MoveCursor {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full session view, sent after every state change.
    SessionState { state: SessionSnapshot },
    /// A grab resolved.
    CatchResult { result: CatchResult },
    Error { message: String },
}
