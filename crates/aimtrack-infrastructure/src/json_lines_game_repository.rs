//! Append-only JSON-lines GameRepository implementation.
//!
//! File layout, one stored game per line, oldest first:
//! ```text
//! {"request_id":"...","recorded_at":"2025-01-01T00:00:00+00:00","data":{...}}
//! {"request_id":"...","recorded_at":"2025-01-01T00:05:00+00:00","data":{...}}
//! ```

use aimtrack_core::error::{AimError, Result};
use aimtrack_core::game::{Game, GameRepository, InsertGameRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Serialize)]
struct StoredGameRef<'a> {
    request_id: Uuid,
    recorded_at: String,
    data: &'a Game,
}

/// Read side of a stored line; the other fields are ignored.
#[derive(Deserialize)]
struct StoredGame {
    data: Game,
}

/// Game repository backed by a single append-only JSON-lines file.
pub struct JsonLinesGameRepository {
    path: PathBuf,
    /// Serializes appends so lines never interleave.
    append_lock: Mutex<()>,
}

impl JsonLinesGameRepository {
    /// Creates a repository writing to `path`. The file is created on first insert.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Game>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut games = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredGame>(line) {
                Ok(stored) => games.push(stored.data),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        "[JsonLinesGameRepository] skipping malformed line: {}",
                        e
                    );
                }
            }
        }
        Ok(games)
    }
}

#[async_trait]
impl GameRepository for JsonLinesGameRepository {
    async fn insert_game(&self, request: &InsertGameRequest) -> Result<()> {
        let mut line = serde_json::to_string(&StoredGameRef {
            request_id: request.request_id,
            recorded_at: chrono::Utc::now().to_rfc3339(),
            data: &request.data,
        })?;
        line.push('\n');

        let _guard = self.append_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AimError::io(format!("Failed to open {}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(
            request_id = %request.request_id,
            "[JsonLinesGameRepository] game appended"
        );
        Ok(())
    }

    /// Reads and parses the whole file on every call, which suits startup
    /// hydration. Paging through a long history from the UI would want a
    /// reverse line reader instead.
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Vec<Game>> {
        let games = self.read_all().await?;
        let offset = page as usize * limit as usize;
        Ok(games
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit as usize)
            .collect())
    }
}
