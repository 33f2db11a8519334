//! Like counter store: the mutable state behind the `learn` card.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

/// Key used for every conversation when the scope is [`LikeScope::Global`].
const GLOBAL_KEY: &str = "*";

/// How like counters are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeScope {
    /// One counter per conversation.
    #[default]
    Conversation,
    /// One counter for the whole process, shared by every conversation.
    Global,
}

impl std::fmt::Display for LikeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conversation => write!(f, "conversation"),
            Self::Global => write!(f, "global"),
        }
    }
}

impl std::str::FromStr for LikeScope {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(Self::Conversation),
            "global" => Ok(Self::Global),
            _ => Err(format!("Unknown like scope: {}", s)),
        }
    }
}

/// In-memory like counters. Every read-modify-write happens under one lock.
#[derive(Debug, Default)]
pub struct LikeStore {
    scope: LikeScope,
    counts: Mutex<HashMap<String, u64>>,
}

impl LikeStore {
    pub fn new(scope: LikeScope) -> Self {
        Self {
            scope,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> LikeScope {
        self.scope
    }

    fn key<'a>(&self, conversation_id: &'a str) -> &'a str {
        match self.scope {
            LikeScope::Conversation => conversation_id,
            LikeScope::Global => GLOBAL_KEY,
        }
    }

    /// Current count (0 if the counter was never touched).
    pub async fn get(&self, conversation_id: &str) -> u64 {
        let counts = self.counts.lock().await;
        counts.get(self.key(conversation_id)).copied().unwrap_or(0)
    }

    /// Reset the counter to 0 and return the new value.
    pub async fn reset(&self, conversation_id: &str) -> u64 {
        let key = self.key(conversation_id);
        self.counts.lock().await.insert(key.to_string(), 0);
        debug!(key = key, "Like counter reset");
        0
    }

    /// Increment the counter by one and return the new value.
    pub async fn increment(&self, conversation_id: &str) -> u64 {
        let key = self.key(conversation_id);
        let mut counts = self.counts.lock().await;
        let count = counts.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        debug!(key = key, like_count = *count, "Like counter incremented");
        *count
    }
}
