//! Write-behind cache of recorded games.
//!
//! `record` updates the in-memory history synchronously and hands the game to
//! the write-behind worker without waiting for it. Local state is what the UI
//! reads; a failed durable write is reported to failure subscribers and is
//! never rolled back into the history.

use super::window::RecentWindow;
use super::writer::{PendingWrite, WriteBehindQueue, WriteFailure};
use aimtrack_core::config::HistoryConfig;
use aimtrack_core::game::{Game, GameRepository};
use aimtrack_core::{AimError, Observer, Publisher, Result, Subscription};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;

/// Newest-first list of games handed to history observers.
pub type GameSnapshot = Vec<Arc<Game>>;

struct HistoryState {
    full: VecDeque<Arc<Game>>,
    recent: RecentWindow<Arc<Game>>,
    /// Bumped every time the history is replaced.
    epoch: u64,
    /// Games recorded since the last replacement. They sit at the front of `full`.
    recorded_since_load: usize,
}

impl HistoryState {
    fn full_snapshot(&self) -> GameSnapshot {
        self.full.iter().cloned().collect()
    }
}

/// In-memory history with a bounded recent-activity projection.
///
/// `full_history` is unbounded and newest first. `recent_history` holds the
/// newest `recent_capacity` games of the same order (5 by default) and slides
/// on every `record`.
pub struct HistoryCache {
    state: Mutex<HistoryState>,
    full_publisher: Publisher<GameSnapshot>,
    recent_publisher: Publisher<GameSnapshot>,
    failures: Publisher<WriteFailure>,
    writer: WriteBehindQueue,
    repository: Arc<dyn GameRepository>,
    recent_capacity: NonZeroUsize,
    hydrate_page_size: u32,
}

impl HistoryCache {
    /// Creates an empty cache and starts its write-behind worker on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns `AimError::InvalidConfig` if `config` does not validate.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(repository: Arc<dyn GameRepository>, config: HistoryConfig) -> Result<Self> {
        Self::with_runtime(repository, config, Handle::current())
    }

    /// Creates an empty cache whose write-behind worker runs on `runtime`.
    pub fn with_runtime(
        repository: Arc<dyn GameRepository>,
        config: HistoryConfig,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        let recent_capacity = NonZeroUsize::new(config.recent_capacity)
            .ok_or_else(|| AimError::config("history.recent_capacity must be positive"))?;

        let failures = Publisher::new();
        let writer = WriteBehindQueue::spawn(repository.clone(), failures.clone(), &runtime);

        Ok(Self {
            state: Mutex::new(HistoryState {
                full: VecDeque::new(),
                recent: RecentWindow::new(recent_capacity),
                epoch: 0,
                recorded_since_load: 0,
            }),
            full_publisher: Publisher::new(),
            recent_publisher: Publisher::new(),
            failures,
            writer,
            repository,
            recent_capacity,
            hydrate_page_size: config.hydrate_page_size,
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in `full` and queues both snapshots. `recorded` leading entries
    /// count as recorded since the replacement.
    fn replace_locked(&self, state: &mut HistoryState, full: VecDeque<Arc<Game>>, recorded: usize) {
        let recent = RecentWindow::from_newest_first(self.recent_capacity, &full);
        *state = HistoryState {
            full,
            recent,
            epoch: state.epoch + 1,
            recorded_since_load: recorded,
        };
        tracing::debug!(
            games = state.full.len(),
            recent = state.recent.len(),
            "[HistoryCache] history replaced"
        );

        self.full_publisher.push(state.full_snapshot());
        self.recent_publisher.push(state.recent.to_vec());
    }

    fn flush(&self) {
        self.full_publisher.flush();
        self.recent_publisher.flush();
    }

    /// Replaces both sequences with `games` (newest first).
    ///
    /// The recent window is rebuilt from the first `recent_capacity` entries.
    /// Writes already queued are not affected.
    pub fn load(&self, games: Vec<Game>) {
        {
            let mut state = self.lock_state();
            self.replace_locked(&mut state, games.into_iter().map(Arc::new).collect(), 0);
        }
        self.flush();
    }

    /// Records a finished game.
    ///
    /// The game is visible to readers and observers when this returns. The
    /// durable write is queued behind earlier ones and runs in the background;
    /// the returned handle may be dropped or awaited.
    pub fn record(&self, game: Game) -> PendingWrite {
        let game = Arc::new(game);

        let (pending, rejected, games) = {
            let mut state = self.lock_state();
            state.full.push_front(game.clone());
            if state.recent.push_front(game.clone()).is_some() {
                tracing::debug!("[HistoryCache] recent window full, oldest entry evicted");
            }
            state.recorded_since_load += 1;
            // Submitting under the state lock keeps backend order equal to local order.
            let (pending, rejected) = self.writer.submit(game.clone());
            self.full_publisher.push(state.full_snapshot());
            self.recent_publisher.push(state.recent.to_vec());
            (pending, rejected, state.full.len())
        };
        tracing::debug!(
            request_id = %pending.request_id(),
            scenario = game.scenario_name().unwrap_or("<unknown>"),
            games,
            "[HistoryCache] game recorded"
        );

        self.flush();
        if let Some(failure) = rejected {
            self.failures.publish(failure);
        }

        pending
    }

    /// Fetches the first page of stored games and loads it.
    ///
    /// Games recorded while the fetch is in flight stay at the front of the
    /// history. A stored game equal to one of them is taken to be its durable
    /// copy and is not listed twice.
    ///
    /// # Returns
    ///
    /// The number of games fetched from the repository.
    pub async fn hydrate(&self) -> Result<usize> {
        let (epoch, recorded_before) = {
            let state = self.lock_state();
            (state.epoch, state.recorded_since_load)
        };

        let mut stored = self
            .repository
            .fetch_page(0, self.hydrate_page_size)
            .await?;
        let fetched = stored.len();

        {
            let mut state = self.lock_state();
            let recorded = if state.epoch == epoch {
                state.recorded_since_load - recorded_before
            } else {
                state.recorded_since_load
            };
            let kept: Vec<Arc<Game>> = state.full.iter().take(recorded).cloned().collect();
            for game in &kept {
                if let Some(position) = stored.iter().position(|s| s == game.as_ref()) {
                    stored.remove(position);
                }
            }
            if recorded > 0 {
                tracing::debug!(
                    recorded,
                    "[HistoryCache] keeping games recorded during hydration"
                );
            }

            let full = kept
                .into_iter()
                .chain(stored.into_iter().map(Arc::new))
                .collect();
            self.replace_locked(&mut state, full, recorded);
        }
        self.flush();

        tracing::info!(games = fetched, "[HistoryCache] hydrated from repository");
        Ok(fetched)
    }

    /// Observes the full history. Receives the current snapshot immediately.
    pub fn subscribe_full(&self, observer: impl Observer<GameSnapshot> + 'static) -> Subscription {
        let observer: Arc<dyn Observer<GameSnapshot>> = Arc::new(observer);
        let subscription = {
            let state = self.lock_state();
            self.full_publisher
                .subscribe_with(observer, state.full_snapshot())
        };
        self.full_publisher.flush();
        subscription
    }

    /// Observes the recent window. Receives the current snapshot immediately.
    pub fn subscribe_recent(
        &self,
        observer: impl Observer<GameSnapshot> + 'static,
    ) -> Subscription {
        let observer: Arc<dyn Observer<GameSnapshot>> = Arc::new(observer);
        let subscription = {
            let state = self.lock_state();
            self.recent_publisher
                .subscribe_with(observer, state.recent.to_vec())
        };
        self.recent_publisher.flush();
        subscription
    }

    /// Observes durable writes that failed. There is no initial value.
    pub fn subscribe_write_failures(
        &self,
        observer: impl Observer<WriteFailure> + 'static,
    ) -> Subscription {
        self.failures.subscribe(Arc::new(observer))
    }

    pub fn full_history(&self) -> GameSnapshot {
        self.lock_state().full_snapshot()
    }

    pub fn recent_history(&self) -> GameSnapshot {
        self.lock_state().recent.to_vec()
    }

    /// Stops the write-behind worker after every queued write reached the backend.
    ///
    /// Later `record` calls still update local history and report
    /// `AimError::WorkerClosed`.
    pub async fn shutdown(&self) -> Result<()> {
        self.writer.shutdown().await?;
        tracing::info!("[HistoryCache] write-behind worker drained");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aimtrack_core::AimError;
    use aimtrack_core::game::{GameStats, InsertGameRequest};
    use async_trait::async_trait;

    struct MockGameRepository {
        inserted: Mutex<Vec<String>>,
        stored: Vec<Game>,
        fail: bool,
    }

    impl MockGameRepository {
        fn new(stored: Vec<Game>, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                inserted: Mutex::new(Vec::new()),
                stored,
                fail,
            })
        }
    }

    #[async_trait]
    impl GameRepository for MockGameRepository {
        async fn insert_game(&self, request: &InsertGameRequest) -> Result<()> {
            if self.fail {
                return Err(AimError::data_access("database is locked"));
            }
            self.inserted
                .lock()
                .unwrap()
                .push(request.data.stats.weapon.clone());
            Ok(())
        }

        async fn fetch_page(&self, page: u32, limit: u32) -> Result<Vec<Game>> {
            Ok(self
                .stored
                .iter()
                .skip((page * limit) as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn game(tag: &str) -> Game {
        Game {
            stats: GameStats {
                weapon: tag.to_string(),
                ..GameStats::default()
            },
            ..Game::default()
        }
    }

    fn tags(snapshot: &GameSnapshot) -> Vec<String> {
        snapshot.iter().map(|g| g.stats.weapon.clone()).collect()
    }

    #[tokio::test]
    async fn test_record_prepends_and_slides_recent_window() {
        let cache = HistoryCache::new(
            MockGameRepository::new(vec![], false),
            HistoryConfig::default(),
        )
        .unwrap();

        for i in 1..=7 {
            drop(cache.record(game(&format!("g{}", i))));
            assert_eq!(cache.recent_history().len(), i.min(5));
            assert_eq!(cache.full_history().len(), i);
        }

        assert_eq!(tags(&cache.recent_history()), vec!["g7", "g6", "g5", "g4", "g3"]);
        assert_eq!(
            tags(&cache.full_history()),
            vec!["g7", "g6", "g5", "g4", "g3", "g2", "g1"]
        );
    }

    #[tokio::test]
    async fn test_record_shares_one_allocation_between_views() {
        let cache = HistoryCache::new(
            MockGameRepository::new(vec![], false),
            HistoryConfig::default(),
        )
        .unwrap();
        drop(cache.record(game("only")));

        let full = cache.full_history();
        let recent = cache.recent_history();
        assert!(Arc::ptr_eq(&full[0], &recent[0]));
    }

    #[tokio::test]
    async fn test_subscribers_get_initial_and_updated_snapshots() {
        let cache = HistoryCache::new(
            MockGameRepository::new(vec![], false),
            HistoryConfig::default(),
        )
        .unwrap();
        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let subscription = cache.subscribe_recent(move |snapshot: &GameSnapshot| {
            sink.lock().unwrap().push(tags(snapshot));
        });

        drop(cache.record(game("a")));
        drop(cache.record(game("b")));
        drop(subscription);
        drop(cache.record(game("c")));

        let expected: Vec<Vec<&str>> = vec![vec![], vec!["a"], vec!["b", "a"]];
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_hydrate_loads_first_page() {
        let stored: Vec<Game> = (0..8).map(|i| game(&format!("s{}", i))).collect();
        let config = HistoryConfig {
            hydrate_page_size: 6,
            ..HistoryConfig::default()
        };
        let cache = HistoryCache::new(
            MockGameRepository::new(stored, false),
            config,
        )
        .unwrap();

        let loaded = cache.hydrate().await.unwrap();

        assert_eq!(loaded, 6);
        assert_eq!(cache.full_history().len(), 6);
        assert_eq!(
            tags(&cache.recent_history()),
            vec!["s0", "s1", "s2", "s3", "s4"]
        );
    }

    #[tokio::test]
    async fn test_failed_write_keeps_local_state_and_reports() {
        let cache = HistoryCache::new(
            MockGameRepository::new(vec![], true),
            HistoryConfig::default(),
        )
        .unwrap();
        let failures: Arc<Mutex<Vec<AimError>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        let _subscription = cache.subscribe_write_failures(move |failure: &WriteFailure| {
            sink.lock().unwrap().push(failure.error.clone());
        });

        let pending = cache.record(game("lost"));
        let request_id = pending.request_id();
        let outcome = pending.wait().await;

        assert_eq!(outcome, Err(AimError::data_access("database is locked")));
        assert_eq!(tags(&cache.full_history()), vec!["lost"]);
        assert_eq!(tags(&cache.recent_history()), vec!["lost"]);
        assert_eq!(failures.lock().unwrap().len(), 1);
        assert!(!request_id.is_nil());
    }

    #[tokio::test]
    async fn test_record_after_shutdown_reports_worker_closed() {
        let repository = MockGameRepository::new(vec![], false);
        let cache = HistoryCache::new(
            repository.clone(),
            HistoryConfig::default(),
        )
        .unwrap();
        let failures = Arc::new(Mutex::new(0));
        let sink = failures.clone();
        let _subscription = cache.subscribe_write_failures(move |_: &WriteFailure| {
            *sink.lock().unwrap() += 1;
        });

        drop(cache.record(game("saved")));
        cache.shutdown().await.unwrap();
        let outcome = cache.record(game("late")).wait().await;

        assert_eq!(outcome, Err(AimError::WorkerClosed));
        assert_eq!(*failures.lock().unwrap(), 1);
        assert_eq!(tags(&cache.full_history()), vec!["late", "saved"]);
        assert_eq!(*repository.inserted.lock().unwrap(), vec!["saved"]);
    }

    struct GatedFetchRepository {
        stored: Vec<Game>,
        fetch_started: tokio::sync::Notify,
        release_fetch: tokio::sync::Notify,
    }

    #[async_trait]
    impl GameRepository for GatedFetchRepository {
        async fn insert_game(&self, _request: &InsertGameRequest) -> Result<()> {
            Ok(())
        }

        async fn fetch_page(&self, _page: u32, _limit: u32) -> Result<Vec<Game>> {
            self.fetch_started.notify_one();
            self.release_fetch.notified().await;
            Ok(self.stored.clone())
        }
    }

    #[tokio::test]
    async fn test_hydrate_keeps_games_recorded_while_fetching() {
        let repository = Arc::new(GatedFetchRepository {
            // "during" was already written by the worker when the page was read.
            stored: vec![game("during"), game("s1"), game("s0")],
            fetch_started: tokio::sync::Notify::new(),
            release_fetch: tokio::sync::Notify::new(),
        });
        let cache = HistoryCache::new(repository.clone(), HistoryConfig::default()).unwrap();
        drop(cache.record(game("before")));

        let (loaded, ()) = tokio::join!(cache.hydrate(), async {
            repository.fetch_started.notified().await;
            drop(cache.record(game("during")));
            repository.release_fetch.notify_one();
        });

        assert_eq!(loaded.unwrap(), 3);
        assert_eq!(tags(&cache.full_history()), vec!["during", "s1", "s0"]);
        assert_eq!(tags(&cache.recent_history()), vec!["during", "s1", "s0"]);

        // A later load replaces everything, including games recorded before it.
        cache.load(vec![game("fresh")]);
        assert_eq!(tags(&cache.full_history()), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_zero_recent_capacity_is_rejected() {
        let config = HistoryConfig {
            recent_capacity: 0,
            ..HistoryConfig::default()
        };

        let result = HistoryCache::new(MockGameRepository::new(vec![], false), config);

        assert!(matches!(result, Err(AimError::InvalidConfig(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_leave_every_observer_current() {
        let cache = Arc::new(
            HistoryCache::new(
                MockGameRepository::new(vec![], false),
                HistoryConfig::default(),
            )
            .unwrap(),
        );

        let last_full_len = Arc::new(Mutex::new(0usize));
        let sink = last_full_len.clone();
        let _full = cache.subscribe_full(move |snapshot: &GameSnapshot| {
            *sink.lock().unwrap() = snapshot.len();
        });
        let last_recent: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = last_recent.clone();
        let _recent = cache.subscribe_recent(move |snapshot: &GameSnapshot| {
            *sink.lock().unwrap() = tags(snapshot);
        });

        let writers: Vec<_> = (0..4)
            .map(|worker| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for n in 0..50 {
                        drop(cache.record(game(&format!("{}-{}", worker, n))));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        let late_cache = cache.clone();
        let late = tokio::spawn(async move {
            let mut watchers = Vec::new();
            for _ in 0..20 {
                let seen = Arc::new(Mutex::new(usize::MAX));
                let sink = seen.clone();
                let subscription = late_cache.subscribe_full(move |snapshot: &GameSnapshot| {
                    *sink.lock().unwrap() = snapshot.len();
                });
                watchers.push((seen, subscription));
                tokio::task::yield_now().await;
            }
            watchers
        });

        for writer in writers {
            writer.await.unwrap();
        }
        let watchers = late.await.unwrap();

        assert_eq!(cache.full_history().len(), 200);
        assert_eq!(*last_full_len.lock().unwrap(), 200);
        assert_eq!(*last_recent.lock().unwrap(), tags(&cache.recent_history()));
        for (seen, _subscription) in &watchers {
            assert_eq!(*seen.lock().unwrap(), 200);
        }
    }
}
