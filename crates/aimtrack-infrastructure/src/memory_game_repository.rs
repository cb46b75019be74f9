//! In-memory GameRepository implementation.

use aimtrack_core::error::Result;
use aimtrack_core::game::{Game, GameRepository, InsertGameRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Game repository that keeps every insert in memory.
///
/// Useful for previews, demos and tests that need a working backend without
/// touching the disk.
#[derive(Default)]
pub struct InMemoryGameRepository {
    /// Stored requests, oldest first.
    requests: RwLock<Vec<InsertGameRequest>>,
}

impl InMemoryGameRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-filled with `games`, given newest first.
    pub fn with_games(games: Vec<Game>) -> Self {
        let requests = games
            .into_iter()
            .rev()
            .map(|game| InsertGameRequest::new(Arc::new(game)))
            .collect();
        Self {
            requests: RwLock::new(requests),
        }
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Request handles in the order they were inserted.
    pub async fn request_ids(&self) -> Vec<Uuid> {
        self.requests
            .read()
            .await
            .iter()
            .map(|request| request.request_id)
            .collect()
    }
}

#[async_trait]
impl GameRepository for InMemoryGameRepository {
    async fn insert_game(&self, request: &InsertGameRequest) -> Result<()> {
        self.requests.write().await.push(request.clone());
        Ok(())
    }

    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Vec<Game>> {
        let offset = page as usize * limit as usize;
        Ok(self
            .requests
            .read()
            .await
            .iter()
            .rev()
            .skip(offset)
            .take(limit as usize)
            .map(|request| request.data.as_ref().clone())
            .collect())
    }
}
