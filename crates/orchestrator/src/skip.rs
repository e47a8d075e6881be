//! User-initiated skip input.

use serde::{Deserialize, Serialize};
use summon_core::AbortReason;
use tokio::sync::broadcast;

/// Keys that skip the spectacle unless configured otherwise.
pub const DEFAULT_SKIP_KEYS: [&str; 3] = ["Escape", "Enter", " "];

const SKIP_CAPACITY: usize = 16;

/// A raw input the host forwards while a presentation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum SkipInput {
    Key(String),
    /// Pointer press on the backdrop outside the card
    BackdropPointer,
}

impl SkipInput {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    /// Abort reason this input maps to, or `None` for keys that are not
    /// configured as skip keys.
    pub fn abort_reason(&self, skip_keys: &[String]) -> Option<AbortReason> {
        match self {
            Self::Key(key) if skip_keys.iter().any(|k| k == key) => Some(AbortReason::SkipKey),
            Self::Key(_) => None,
            Self::BackdropPointer => Some(AbortReason::BackdropInteraction),
        }
    }
}

/// Broadcast source of skip input.
///
/// Subscriptions are scoped: a receiver that is dropped stops listening,
/// which is how a finished presentation unsubscribes.
#[derive(Clone)]
pub struct SkipChannel {
    sender: broadcast::Sender<SkipInput>,
}

impl SkipChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SKIP_CAPACITY);
        Self { sender }
    }

    /// Forward an input. Returns how many presentations observed it.
    pub fn send(&self, input: SkipInput) -> usize {
        self.sender.send(input).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SkipInput> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SkipChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SkipChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
