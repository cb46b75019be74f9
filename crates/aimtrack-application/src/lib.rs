//! Application layer for aimtrack.
//!
//! This crate provides the client-side reactive state: the notification
//! queue with auto-dismissal and the write-behind history cache, plus the
//! wiring that connects them.

pub mod history;
pub mod logging;
pub mod notification;
pub mod services;

pub use history::{HistoryCache, PendingWrite, WriteFailure};
pub use notification::{NotificationQueue, TimerStatus};
pub use services::AppServices;
