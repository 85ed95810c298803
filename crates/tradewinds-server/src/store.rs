//! Keyed storage for match state.
//!
//! Rooms never hold a `GameState` themselves: every action loads the current
//! state from a `StateStore`, applies to it, and writes the result back.

use dashmap::DashMap;
use thiserror::Error;
use tradewinds_core::GameState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    #[error("Stored state is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("No stored state for room {0}")]
    Missing(String),
}

/// Get/set of serialized match state keyed by room name.
pub trait StateStore: Send + Sync {
    fn load(&self, room: &str) -> Result<Option<GameState>, StoreError>;

    fn save(&self, room: &str, state: &GameState) -> Result<(), StoreError>;

    fn remove(&self, room: &str) -> Result<(), StoreError>;

    /// Like `load`, but a room without state is an error
    fn load_existing(&self, room: &str) -> Result<GameState, StoreError> {
        self.load(room)?
            .ok_or_else(|| StoreError::Missing(room.to_string()))
    }
}

/// In-process store holding JSON strings, the same shape an external
/// key-value store would hold.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(room: &str) -> String {
        format!("room:{room}:match")
    }
}

impl StateStore for MemoryStore {
    fn load(&self, room: &str) -> Result<Option<GameState>, StoreError> {
        match self.entries.get(&Self::key(room)) {
            Some(json) => Ok(Some(GameState::from_json(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, room: &str, state: &GameState) -> Result<(), StoreError> {
        self.entries.insert(Self::key(room), state.to_json()?);
        Ok(())
    }

    fn remove(&self, room: &str) -> Result<(), StoreError> {
        self.entries.remove(&Self::key(room));
        Ok(())
    }
}
