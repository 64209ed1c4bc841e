// Round engine: session state machine, item spawn table, and timer driver.

pub mod engine;
pub mod items;
pub mod session;

pub use engine::RoundEngine;
pub use items::ItemCatalog;
