use serde::{Deserialize, Serialize};

/// Item rarity tiers, ordered from rarest to most common.
///
/// The declaration order matters: the spawn table walks tiers in this order
/// for the cumulative weighted draw, and the last tier is the "low tier"
/// that survives the partial clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Legendary,
    Rare,
    Uncommon,
    Common,
    VeryCommon,
}

/// One spawned item instance sitting in a grid cell.
///
/// `id` values are unique and monotonic within a session so clients can use
/// them as stable keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub emoji: String,
    pub points: u32,
    pub rarity: Rarity,
}

/// Row-major square grid; `None` is an empty cell.
pub type Grid = Vec<Vec<Option<Item>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Running,
    Ended,
}

/// Transient outcome of a resolved grab, shown briefly to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatchResult {
    Caught { points: u32 },
    Miss,
}

/// Raw pointer/touch offset within the grid's on-screen bounds, as reported
/// by the client. Offsets are in pixels relative to the grid's top-left
/// corner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointerInput {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Full read-only view of a session, broadcast to the client after every
/// state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub grid: Grid,
    pub cursor: Position,
    pub score: u64,
    pub time_remaining: u32,
    pub phase: Phase,
    pub pending_catch: Option<CatchResult>,
    pub dropping: bool,
}
