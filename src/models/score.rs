use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One leaderboard entry in the `high_scores` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HighScore {
    pub id: i32,
    pub player_name: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}
