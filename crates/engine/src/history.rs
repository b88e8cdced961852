//! Undo/Redo history for sheet transactions
//!
//! Every entry is a complete serialized snapshot of the sheet taken before a
//! mutation. Snapshots are encoded with `serde_json` when pushed and decoded
//! when restored, so stored history can never alias live state.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::GridError;

#[derive(Debug, Clone, Default)]
pub struct History {
    undo_stack: Vec<String>,
    redo_stack: Vec<String>,
}

fn encode<T: Serialize>(data: &T) -> Result<String, GridError> {
    serde_json::to_string(data).map_err(|e| GridError::Snapshot(e.to_string()))
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, GridError> {
    serde_json::from_str(text).map_err(|e| GridError::Snapshot(e.to_string()))
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state before a mutation. Clears the redo stack.
    pub fn add<T: Serialize>(&mut self, data: &T) -> Result<(), GridError> {
        self.undo_stack.push(encode(data)?);
        self.redo_stack.clear();
        Ok(())
    }

    /// Pop the last snapshot, stashing `current` for redo.
    /// `Ok(None)` when there is nothing to undo.
    pub fn undo<T: Serialize + DeserializeOwned>(&mut self, current: &T) -> Result<Option<T>, GridError> {
        let Some(last) = self.undo_stack.last() else {
            return Ok(None);
        };
        let restored = decode(last)?;
        let current = encode(current)?;
        self.undo_stack.pop();
        self.redo_stack.push(current);
        Ok(Some(restored))
    }

    /// Symmetric to [`History::undo`].
    pub fn redo<T: Serialize + DeserializeOwned>(&mut self, current: &T) -> Result<Option<T>, GridError> {
        let Some(last) = self.redo_stack.last() else {
            return Ok(None);
        };
        let restored = decode(last)?;
        let current = encode(current)?;
        self.redo_stack.pop();
        self.undo_stack.push(current);
        Ok(Some(restored))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
