//! User-facing notification types.

mod model;

pub use model::{Notification, NotificationKind, generate_id};
