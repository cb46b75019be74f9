//! Game domain module.
//!
//! - `model`: Recorded session types (`Game`, `TileRecord`, `KeyValueRecord`, `GameStats`)
//! - `repository`: Persistence port (`GameRepository`, `InsertGameRequest`)

mod model;
mod repository;

pub use model::{Game, GameStats, KeyValueRecord, TileRecord};
pub use repository::{GameRepository, InsertGameRequest};
