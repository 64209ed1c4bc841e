pub mod score;
pub mod session;

pub use score::HighScore;
pub use session::{
    CatchResult, Grid, Item, Phase, PointerInput, Position, Rarity, SessionSnapshot,
};
