use crate::{db, models::HighScore, AppState};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// How many entries the public leaderboard shows.
const TOP_SCORES_LIMIT: i64 = 10;
/// Longest accepted player name, in characters.
const MAX_PLAYER_NAME_CHARS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct SubmitScoreRequest {
    pub player_name: String,
    pub score: i64,
}

type ApiError = (StatusCode, Json<Value>);

/// Append a score to the leaderboard.
///
/// Validation failures are the caller's problem (400); database failures are
/// logged and reported as 500 so the client can show a non-blocking message.
pub async fn submit_score(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitScoreRequest>,
) -> Result<Json<HighScore>, ApiError> {
    let name = validate_player_name(&payload.player_name).map_err(bad_request)?;
    if payload.score < 0 {
        return Err(bad_request("score must be non-negative"));
    }

    let record = db::queries::insert_high_score(&state.db, name, payload.score)
        .await
        .map_err(|e| {
            tracing::error!("Failed to submit score for '{}': {}", name, e);
            internal_error("failed to submit score")
        })?;

    tracing::info!("Score submitted: {} -> {}", record.player_name, record.score);
    Ok(Json(record))
}

/// The top 10, highest score first.
pub async fn top_scores(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HighScore>>, ApiError> {
    let scores = db::queries::top_high_scores(&state.db, TOP_SCORES_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch top scores: {}", e);
            internal_error("failed to fetch scores")
        })?;
    Ok(Json(scores))
}

/// A usable player name: non-empty after trimming and at most 20 characters.
fn validate_player_name(raw: &str) -> Result<&str, &'static str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err("player name must not be empty");
    }
    if name.chars().count() > MAX_PLAYER_NAME_CHARS {
        return Err("player name must be at most 20 characters");
    }
    Ok(name)
}

fn bad_request(reason: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": reason })))
}

fn internal_error(reason: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": reason })),
    )
}
