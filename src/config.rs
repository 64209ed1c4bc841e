use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub game: GameConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_dir: String,
}

/// All session timing and layout knobs, with the stock game as defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Side length of the square item grid.
    pub grid_size: usize,
    /// Session length in seconds.
    pub game_duration_secs: u32,
    /// How long a full spawn wave stays on the grid before the partial clear.
    pub normal_visible_ms: u64,
    /// How long the surviving low-tier items stay after the partial clear.
    pub low_tier_visible_ms: u64,
    /// Idle time with an empty grid before the next wave.
    pub clear_duration_ms: u64,
    /// Delay between requesting a grab and resolving it.
    pub drop_delay_ms: u64,
    /// How long a catch/miss result stays visible.
    pub catch_display_ms: u64,
    /// Sessions older than this are evicted by the cleanup task.
    pub session_max_age_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a number")?,
        };

        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("PORT must be a number")?,
            frontend_dir: env::var("FRONTEND_DIR").unwrap_or_else(|_| "./frontend".to_string()),
        };

        let game = GameConfig {
            grid_size: env_or("GRID_SIZE", 6),
            game_duration_secs: env_or("GAME_DURATION_SECS", 100),
            normal_visible_ms: env_or("NORMAL_VISIBLE_MS", 1000),
            low_tier_visible_ms: env_or("LOW_TIER_VISIBLE_MS", 1500),
            clear_duration_ms: env_or("CLEAR_DURATION_MS", 750),
            drop_delay_ms: env_or("DROP_DELAY_MS", 300),
            catch_display_ms: env_or("CATCH_DISPLAY_MS", 800),
            session_max_age_secs: env_or("SESSION_MAX_AGE_SECS", 900),
        };

        Ok(Config {
            database,
            server,
            game,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl GameConfig {
    pub fn normal_visible(&self) -> Duration {
        Duration::from_millis(self.normal_visible_ms)
    }

    pub fn low_tier_visible(&self) -> Duration {
        Duration::from_millis(self.low_tier_visible_ms)
    }

    pub fn clear_duration(&self) -> Duration {
        Duration::from_millis(self.clear_duration_ms)
    }

    pub fn drop_delay(&self) -> Duration {
        Duration::from_millis(self.drop_delay_ms)
    }

    pub fn catch_display(&self) -> Duration {
        Duration::from_millis(self.catch_display_ms)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }
}

fn env_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
impl GameConfig {
    /// Stock values without touching the environment; tests override the
    /// fields they care about.
    pub fn stock() -> Self {
        Self {
            grid_size: 6,
            game_duration_secs: 100,
            normal_visible_ms: 1000,
            low_tier_visible_ms: 1500,
            clear_duration_ms: 750,
            drop_delay_ms: 300,
            catch_display_ms: 800,
            session_max_age_secs: 900,
        }
    }
}
