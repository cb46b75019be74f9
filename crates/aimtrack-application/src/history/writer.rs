//! Write-behind persistence worker.
//!
//! Inserts are pushed onto an unbounded channel and consumed by a single
//! task that calls the repository one request at a time. The backend
//! therefore sees inserts in submission order, and submitting never waits on
//! the backend.

use aimtrack_core::game::{Game, GameRepository, InsertGameRequest};
use aimtrack_core::{AimError, Publisher, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A durable write that did not succeed.
///
/// Local history already contains `game`; this event only tells the caller
/// that "recorded" does not mean "saved".
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub request_id: Uuid,
    pub game: Arc<Game>,
    pub error: AimError,
}

/// Handle to an in-flight durable write.
///
/// Dropping it is the fire-and-forget path; [`PendingWrite::wait`] resolves
/// once the backend answered.
#[derive(Debug)]
pub struct PendingWrite {
    request_id: Uuid,
    reply: oneshot::Receiver<Result<()>>,
}

impl PendingWrite {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Waits for the backend's answer to this write.
    pub async fn wait(self) -> Result<()> {
        self.reply.await.map_err(|_| AimError::WorkerClosed)?
    }
}

struct WriteJob {
    request: InsertGameRequest,
    reply: oneshot::Sender<Result<()>>,
}

pub(crate) struct WriteBehindQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<WriteJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBehindQueue {
    pub(crate) fn spawn(
        repository: Arc<dyn GameRepository>,
        failures: Publisher<WriteFailure>,
        runtime: &Handle,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = runtime.spawn(run_worker(repository, receiver, failures));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an insert for `game` behind every previously submitted one.
    ///
    /// When the worker is already closed the returned handle resolves to
    /// `AimError::WorkerClosed` and the failure is handed back for the caller
    /// to publish once it released its own locks.
    pub(crate) fn submit(&self, game: Arc<Game>) -> (PendingWrite, Option<WriteFailure>) {
        let request = InsertGameRequest::new(game);
        let request_id = request.request_id;
        let (reply_tx, reply_rx) = oneshot::channel();
        let pending = PendingWrite {
            request_id,
            reply: reply_rx,
        };

        let job = WriteJob {
            request,
            reply: reply_tx,
        };
        let rejected = match Self::lock(&self.sender).as_ref() {
            Some(sender) => sender.send(job).err().map(|mpsc::error::SendError(job)| job),
            None => Some(job),
        };

        let Some(job) = rejected else {
            tracing::debug!(request_id = %request_id, "[WriteBehind] insert queued");
            return (pending, None);
        };

        tracing::warn!(
            request_id = %request_id,
            "[WriteBehind] worker closed, insert dropped"
        );
        let _ = job.reply.send(Err(AimError::WorkerClosed));
        let failure = WriteFailure {
            request_id,
            game: job.request.data,
            error: AimError::WorkerClosed,
        };
        (pending, Some(failure))
    }

    /// Stops accepting writes and waits until everything queued so far reached the backend.
    pub(crate) async fn shutdown(&self) -> Result<()> {
        drop(Self::lock(&self.sender).take());

        let worker = Self::lock(&self.worker).take();
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| AimError::internal(format!("write-behind worker failed: {}", e)))?;
        }
        Ok(())
    }
}

async fn run_worker(
    repository: Arc<dyn GameRepository>,
    mut receiver: mpsc::UnboundedReceiver<WriteJob>,
    failures: Publisher<WriteFailure>,
) {
    while let Some(job) = receiver.recv().await {
        let request_id = job.request.request_id;
        let result = repository.insert_game(&job.request).await;

        match &result {
            Ok(()) => {
                tracing::debug!(request_id = %request_id, "[WriteBehind] insert stored");
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "[WriteBehind] insert failed; local history keeps the game"
                );
                failures.publish(WriteFailure {
                    request_id,
                    game: job.request.data.clone(),
                    error: e.clone(),
                });
            }
        }

        // The caller may have dropped its PendingWrite.
        let _ = job.reply.send(result);
    }

    tracing::info!("[WriteBehind] channel closed, worker stopped");
}
