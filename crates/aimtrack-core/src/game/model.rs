//! Recorded game session domain model.
//!
//! A [`Game`] is produced once by the capture pipeline and handed to the
//! history layer as a finished value. Nothing in this workspace mutates a
//! game after construction.

use serde::{Deserialize, Serialize};

/// One kill event recorded during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub kill: u32,
    /// Wall-clock time of the kill as written by the trainer, if present.
    pub timestamp: Option<String>,
    pub bot: String,
    pub weapon: String,
    /// Time to kill in seconds.
    pub ttk: f64,
    pub shots: u32,
    pub accuracy: f64,
    pub damage_done: f64,
    pub damage_taken: f64,
    pub efficiency: f64,
    pub cheated: Option<bool>,
}

/// Free-form metadata entry (`"Scenario:"`, `"Score:"`, `"FOV:"`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueRecord {
    pub key: String,
    pub value: serde_json::Value,
}

/// Summary statistics for a whole session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub weapon: String,
    pub shots: u32,
    pub hits: u32,
    pub damage_done: f64,
    /// Older backends name this field `damage_possible`.
    #[serde(alias = "damage_possible")]
    pub damage_taken: f64,
}

/// A single recorded practice session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Game {
    #[serde(default)]
    pub tiles: Vec<TileRecord>,
    #[serde(default)]
    pub key_value: Vec<KeyValueRecord>,
    pub stats: GameStats,
}

impl Game {
    /// Metadata key the trainer uses for the scenario name.
    pub const SCENARIO_KEY: &'static str = "Scenario:";

    /// Looks up a metadata value by its key.
    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.key_value
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    /// Name of the scenario this session was played on, if recorded.
    pub fn scenario_name(&self) -> Option<&str> {
        self.metadata(Self::SCENARIO_KEY).and_then(|v| v.as_str())
    }
}
