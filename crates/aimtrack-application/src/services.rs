//! Application-level wiring of the notification queue and history cache.

use crate::history::{HistoryCache, WriteFailure};
use crate::notification::NotificationQueue;
use aimtrack_core::game::GameRepository;
use aimtrack_core::{Result, StateConfig, Subscription};
use std::sync::Arc;

/// Explicitly constructed state layer shared by the UI commands.
///
/// Owns one `NotificationQueue` and one `HistoryCache`. Every failed durable
/// write is turned into a `danger` notification so the user learns that a
/// recorded game has not been saved.
pub struct AppServices {
    notifications: NotificationQueue,
    history: HistoryCache,
    config: StateConfig,
    _failure_route: Subscription,
}

impl AppServices {
    /// Builds the services on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AimError::InvalidConfig` if `config` does not validate.
    pub fn new(config: StateConfig, repository: Arc<dyn GameRepository>) -> Result<Self> {
        config.validate()?;

        let notifications = NotificationQueue::new(config.notifications.clone());
        let history = HistoryCache::new(repository, config.history.clone())?;

        let queue = notifications.clone();
        let failure_timeout_ms = config.notifications.failure_timeout_ms;
        let failure_route = history.subscribe_write_failures(move |failure: &WriteFailure| {
            let message = format!("Game recorded but not saved: {}", failure.error);
            if let Err(e) = queue.danger(message, failure_timeout_ms) {
                tracing::error!(
                    request_id = %failure.request_id,
                    "[AppServices] failed to surface write failure: {}",
                    e
                );
            }
        });

        Ok(Self {
            notifications,
            history,
            config,
            _failure_route: failure_route,
        })
    }

    /// Builds the services and hydrates history from the repository.
    ///
    /// A failed hydration leaves the history empty and is shown to the user
    /// as a warning instead of aborting startup.
    pub async fn start(config: StateConfig, repository: Arc<dyn GameRepository>) -> Result<Self> {
        let services = Self::new(config, repository)?;

        if let Err(e) = services.history.hydrate().await {
            tracing::warn!("[AppServices] history hydration failed: {}", e);
            services.notifications.warning(
                format!("Could not load game history: {}", e),
                services.config.notifications.failure_timeout_ms,
            )?;
        }

        Ok(services)
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// Drains pending durable writes before the application exits.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("[AppServices] shutting down");
        self.history.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aimtrack_core::AimError;
    use aimtrack_core::game::{Game, InsertGameRequest};
    use aimtrack_core::notification::{Notification, NotificationKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct BrokenRepository;

    #[async_trait]
    impl GameRepository for BrokenRepository {
        async fn insert_game(&self, _request: &InsertGameRequest) -> Result<()> {
            Err(AimError::io("backend unreachable"))
        }

        async fn fetch_page(&self, _page: u32, _limit: u32) -> Result<Vec<Game>> {
            Err(AimError::io("backend unreachable"))
        }
    }

    #[tokio::test]
    async fn test_write_failure_becomes_danger_notification() {
        let services = AppServices::new(StateConfig::default(), Arc::new(BrokenRepository)).unwrap();

        let outcome = services.history().record(Game::default()).wait().await;

        assert!(outcome.is_err());
        assert_eq!(services.history().full_history().len(), 1);
        let pending = services.notifications().snapshot();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::Danger);
        assert_eq!(pending[0].timeout_ms, 5000);
        assert!(pending[0].message.starts_with("Game recorded but not saved"));
    }

    #[tokio::test]
    async fn test_start_survives_failed_hydration() {
        let services = AppServices::start(StateConfig::default(), Arc::new(BrokenRepository))
            .await
            .unwrap();

        assert!(services.history().full_history().is_empty());
        let seen: Arc<Mutex<Vec<Notification>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = services
            .notifications()
            .subscribe(move |pending: &Vec<Notification>| *sink.lock().unwrap() = pending.clone());

        let pending = seen.lock().unwrap().clone();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::Warning);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = StateConfig::default();
        config.history.recent_capacity = 0;

        let result = AppServices::new(config, Arc::new(BrokenRepository));

        assert!(matches!(result, Err(AimError::InvalidConfig(_))));
    }
}
