//! Domain types and ports for the aimtrack client state layer.
//!
//! This crate holds the records exchanged with the native backend, the
//! repository trait the history cache writes through, the observer
//! primitives used by the reactive stores, and shared configuration.

pub mod config;
pub mod error;
pub mod game;
pub mod notification;
pub mod observer;

// Re-export common types
pub use config::StateConfig;
pub use error::{AimError, Result};
pub use observer::{Observer, Publisher, Subscription};
