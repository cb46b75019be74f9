//! Notification application services.

mod queue;

pub use queue::{NotificationQueue, TimerStatus};
