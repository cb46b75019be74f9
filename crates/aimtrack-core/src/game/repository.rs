//! Game repository trait.
//!
//! Defines the contract the history layer expects from the durable backend.

use super::model::Game;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Outbound "insert session" request.
///
/// On the wire this is `{ "data": <game> }`; `request_id` is the opaque
/// handle identifying the request and is not part of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertGameRequest {
    #[serde(skip, default = "Uuid::new_v4")]
    pub request_id: Uuid,
    pub data: Arc<Game>,
}

impl InsertGameRequest {
    /// Creates a request with a fresh random handle.
    pub fn new(data: Arc<Game>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            data,
        }
    }
}

/// An abstract repository for recorded games.
///
/// This trait decouples the history cache from the storage mechanism
/// (native database, files, remote API).
///
/// # Implementation Notes
///
/// Implementations receive inserts strictly in the order the cache recorded
/// them and one at a time. Retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Persists a single game.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Game stored
    /// - `Err(_)`: The write failed; the caller will not retry
    async fn insert_game(&self, request: &InsertGameRequest) -> Result<()>;

    /// Fetches one page of stored games, newest first.
    ///
    /// # Arguments
    ///
    /// * `page` - Zero-based page index
    /// * `limit` - Maximum number of games per page
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Vec<Game>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_request_wire_shape() {
        let request = InsertGameRequest::new(Arc::new(Game::default()));
        let value = serde_json::to_value(&request).unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(value["data"]["tiles"], json!([]));
    }

    #[test]
    fn test_insert_requests_get_distinct_handles() {
        let game = Arc::new(Game::default());
        let a = InsertGameRequest::new(game.clone());
        let b = InsertGameRequest::new(game);
        assert_ne!(a.request_id, b.request_id);
    }
}
