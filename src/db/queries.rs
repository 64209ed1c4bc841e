use sqlx::{PgPool, Result};

use crate::models::HighScore;

/// Append one leaderboard record.
pub async fn insert_high_score(pool: &PgPool, player_name: &str, score: i64) -> Result<HighScore> {
    sqlx::query_as::<_, HighScore>(
        r#"
        INSERT INTO high_scores (player_name, score)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(player_name)
    .bind(score)
    .fetch_one(pool)
    .await
}

/// The ranked board: highest score first, earliest submission winning ties.
pub async fn top_high_scores(pool: &PgPool, limit: i64) -> Result<Vec<HighScore>> {
    sqlx::query_as::<_, HighScore>(
        r#"
        SELECT * FROM high_scores
        ORDER BY score DESC, created_at ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
