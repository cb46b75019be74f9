use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual category of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Default,
    Danger,
    Warning,
    Info,
    Success,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Danger => "danger",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transient message shown to the user until its timeout elapses.
///
/// Serializes as `{ "id", "message", "type", "timeout" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Display duration in milliseconds, counted while this is the head.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
}

impl Notification {
    /// Creates a notification with a freshly generated id.
    pub fn new(message: impl Into<String>, kind: NotificationKind, timeout_ms: u64) -> Self {
        Self {
            id: generate_id(),
            message: message.into(),
            kind,
            timeout_ms,
        }
    }
}

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates a random notification id such as `"_k3v9x0q2a1"`.
///
/// Ids are collision-improbable, not unique. They only need to tell apart the
/// handful of notifications alive in one UI session.
pub fn generate_id() -> String {
    let mut value: u64 = rand::random();
    let mut digits = Vec::with_capacity(14);
    loop {
        digits.push(ID_ALPHABET[(value % 36) as usize]);
        value /= 36;
        if value == 0 {
            break;
        }
    }
    digits.push(b'_');
    digits.iter().rev().map(|&b| b as char).collect()
}
