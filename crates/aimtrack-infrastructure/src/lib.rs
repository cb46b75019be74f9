//! Concrete `GameRepository` implementations.

pub mod json_lines_game_repository;
pub mod memory_game_repository;

pub use crate::json_lines_game_repository::JsonLinesGameRepository;
pub use crate::memory_game_repository::InMemoryGameRepository;
