use rand::Rng;
use thiserror::Error;

use crate::{
    config::GameConfig,
    game::items::{CatalogError, ItemCatalog, ItemDef},
    models::{CatchResult, Grid, Item, Phase, PointerInput, Position, Rarity, SessionSnapshot},
};

/// Cells filled by the weighted-rarity draw per spawn wave.
const WEIGHTED_PER_WAVE: usize = 3;
/// Additional cells filled from the lowest tier per spawn wave.
const LOW_TIER_PER_WAVE: usize = 3;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("grid size must be at least 1")]
    InvalidGridSize,
    #[error("game duration must be at least 1 second")]
    InvalidDuration,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// The session state machine.
///
/// Pure and synchronous: all timing lives in the session driver, which calls
/// these methods at the right moments. Every method is a total function over
/// the state space; calls that make no sense in the current phase are silent
/// no-ops.
pub struct RoundEngine {
    config: GameConfig,
    catalog: ItemCatalog,
    lowest_rarity: Rarity,
    grid: Grid,
    cursor: Position,
    score: u64,
    time_remaining: u32,
    phase: Phase,
    pending_catch: Option<CatchResult>,
    dropping: bool,
    next_item_id: u64,
}

impl RoundEngine {
    pub fn new(config: GameConfig, catalog: ItemCatalog) -> Result<Self, EngineError> {
        if config.grid_size == 0 {
            return Err(EngineError::InvalidGridSize);
        }
        if config.game_duration_secs == 0 {
            return Err(EngineError::InvalidDuration);
        }
        catalog.validate()?;

        let lowest_rarity = catalog.lowest_rarity();
        let grid = empty_grid(config.grid_size);
        let time_remaining = config.game_duration_secs;
        Ok(Self {
            config,
            catalog,
            lowest_rarity,
            grid,
            cursor: Position { x: 0, y: 0 },
            score: 0,
            time_remaining,
            phase: Phase::NotStarted,
            pending_catch: None,
            dropping: false,
            next_item_id: 0,
        })
    }

    /// Start (or restart) a session: everything resets and the phase goes to
    /// `Running`. The crane starts centered on the top row.
    pub fn start(&mut self) {
        self.grid = empty_grid(self.config.grid_size);
        self.cursor = Position {
            x: self.config.grid_size / 2,
            y: 0,
        };
        self.score = 0;
        self.time_remaining = self.config.game_duration_secs;
        self.pending_catch = None;
        self.dropping = false;
        self.next_item_id = 0;
        self.phase = Phase::Running;
    }

    /// One second of countdown. Hitting zero flips the phase to `Ended` on
    /// the same tick, so callers never observe a zero clock with a stale
    /// phase.
    pub fn tick(&mut self) -> Phase {
        if self.phase != Phase::Running {
            return self.phase;
        }
        if self.time_remaining <= 1 {
            self.time_remaining = 0;
            self.phase = Phase::Ended;
        } else {
            self.time_remaining -= 1;
        }
        self.phase
    }

    /// Populate a fresh wave: the grid is cleared, then three cells get
    /// weighted-rarity items and three further distinct cells get low-tier
    /// items. On grids too small for a full wave, the weighted draws win the
    /// remaining cells.
    pub fn spawn_wave(&mut self, rng: &mut impl Rng) {
        if self.phase != Phase::Running {
            return;
        }
        self.grid = empty_grid(self.config.grid_size);

        let side = self.config.grid_size;
        let mut open: Vec<Position> = (0..side)
            .flat_map(|y| (0..side).map(move |x| Position { x, y }))
            .collect();

        for _ in 0..WEIGHTED_PER_WAVE {
            let Some(pos) = take_random(&mut open, rng) else {
                return;
            };
            let def = *self.catalog.draw_weighted(rng);
            self.place(pos, def);
        }
        for _ in 0..LOW_TIER_PER_WAVE {
            let Some(pos) = take_random(&mut open, rng) else {
                return;
            };
            let def = *self.catalog.draw_low_tier(rng);
            self.place(pos, def);
        }
    }

    /// Partial clear: remove everything above the lowest tier.
    pub fn clear_upper_tiers(&mut self) {
        for row in &mut self.grid {
            for cell in row.iter_mut() {
                if cell.as_ref().is_some_and(|item| item.rarity != self.lowest_rarity) {
                    *cell = None;
                }
            }
        }
    }

    /// Full clear: empty the grid.
    pub fn clear_grid(&mut self) {
        self.grid = empty_grid(self.config.grid_size);
    }

    /// Request a grab. Returns true if the drop started; false while the
    /// session is not running or a previous drop is still in flight.
    pub fn begin_grab(&mut self) -> bool {
        if self.phase != Phase::Running || self.dropping {
            return false;
        }
        self.dropping = true;
        true
    }

    /// Resolve a grab after the drop delay, against the grid as it is *now*.
    /// The grid may have changed since the grab was requested; a clear that
    /// fired during the delay turns a would-be catch into a miss.
    pub fn resolve_grab(&mut self) -> Option<CatchResult> {
        if !self.dropping {
            return None;
        }
        self.dropping = false;
        let result = match self.grid[self.cursor.y][self.cursor.x].take() {
            Some(item) => {
                self.score += u64::from(item.points);
                CatchResult::Caught {
                    points: item.points,
                }
            }
            None => CatchResult::Miss,
        };
        self.pending_catch = Some(result);
        Some(result)
    }

    /// Expire the transient catch/miss display.
    pub fn clear_pending_catch(&mut self) {
        self.pending_catch = None;
    }

    /// Map a raw pointer offset to a cell via `floor(offset / cell_size)`.
    /// Out-of-bounds input leaves the cursor unchanged; movement is ignored
    /// entirely while a drop is in flight. Returns true if the cursor moved.
    pub fn move_cursor(&mut self, pointer: PointerInput) -> bool {
        if self.phase != Phase::Running || self.dropping {
            return false;
        }
        if pointer.width <= 0.0 || pointer.height <= 0.0 {
            return false;
        }
        let side = self.config.grid_size as f32;
        let gx = (pointer.x / (pointer.width / side)).floor();
        let gy = (pointer.y / (pointer.height / side)).floor();
        if gx < 0.0 || gy < 0.0 || gx >= side || gy >= side {
            return false;
        }
        let next = Position {
            x: gx as usize,
            y: gy as usize,
        };
        if next == self.cursor {
            return false;
        }
        self.cursor = next;
        true
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pending_catch(&self) -> Option<CatchResult> {
        self.pending_catch
    }

    pub fn is_dropping(&self) -> bool {
        self.dropping
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            grid: self.grid.clone(),
            cursor: self.cursor,
            score: self.score,
            time_remaining: self.time_remaining,
            phase: self.phase,
            pending_catch: self.pending_catch,
            dropping: self.dropping,
        }
    }

    fn place(&mut self, pos: Position, def: ItemDef) {
        let id = self.next_item_id;
        self.next_item_id += 1;
        self.grid[pos.y][pos.x] = Some(Item {
            id,
            emoji: def.emoji.to_string(),
            points: def.points,
            rarity: def.rarity,
        });
    }
}

fn empty_grid(side: usize) -> Grid {
    vec![vec![None; side]; side]
}

fn take_random(open: &mut Vec<Position>, rng: &mut impl Rng) -> Option<Position> {
    if open.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..open.len());
    Some(open.swap_remove(idx))
}
