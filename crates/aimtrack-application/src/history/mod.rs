//! Game history application services.
//!
//! - `cache`: `HistoryCache`, the write-behind cache the UI reads from
//! - `window`: `RecentWindow`, the bounded recent-activity projection
//! - `writer`: the background worker that forwards inserts to the repository

mod cache;
mod window;
mod writer;

pub use cache::{GameSnapshot, HistoryCache};
pub use window::RecentWindow;
pub use writer::{PendingWrite, WriteFailure};
