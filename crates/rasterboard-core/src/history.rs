//! Snapshot-based undo/redo.
//!
//! History is a bounded ring of full-content snapshots with a movable cursor.
//! Entries are whole encodings of every layer surface, not deltas, so undo
//! followed by redo reproduces the prior composite byte for byte.

use crate::error::{Error, Result};
use crate::layer::{LayerId, LayerStack};
use crate::surface::{EncodedSurface, RasterSurface};
use serde::{Deserialize, Serialize};

/// Maximum number of snapshots kept. Bounds worst-case memory structurally.
pub const HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerSnapshot {
    id: LayerId,
    surface: EncodedSurface,
}

/// An opaque encoded snapshot of every layer's content at one point in time.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    layers: Vec<LayerSnapshot>,
}

impl HistoryEntry {
    fn capture(stack: &LayerStack) -> Self {
        Self {
            layers: stack
                .iter()
                .map(|layer| LayerSnapshot {
                    id: layer.id(),
                    surface: layer.surface().encode(),
                })
                .collect(),
        }
    }

    /// Decode each layer's content back into the matching layer.
    ///
    /// Layers are matched by id; snapshots whose id is gone fall back to the
    /// layer at the same index when one exists. When the stack has changed
    /// shape since the snapshot this is best-effort: unmatched snapshots are
    /// skipped and unmatched layers keep their current content.
    pub fn restore(&self, stack: &mut LayerStack) -> Result<()> {
        let indices: Vec<LayerId> = stack.iter().map(|l| l.id()).collect();
        for (i, snap) in self.layers.iter().enumerate() {
            let target = if stack.layer(snap.id).is_some() {
                snap.id
            } else if let Some(&by_index) = indices.get(i) {
                by_index
            } else {
                continue;
            };
            let decoded = RasterSurface::decode(&snap.surface)?;
            if let Some(layer) = stack.layer_mut(target) {
                *layer.surface_mut() = decoded;
            }
        }
        Ok(())
    }
}

/// Bounded ring of snapshots with a cursor into the current state.
///
/// `cursor` always satisfies `0 <= cursor < len` while non-empty, and points
/// at the entry describing the present canvas.
#[derive(Debug)]
pub struct HistoryEngine {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    capacity: usize,
}

impl Default for HistoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryEngine {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor + 1 < self.entries.len()
    }

    /// Capture the stack's current content as the new head of history.
    ///
    /// Entries past the cursor (the redo branch) are discarded, then the new
    /// entry is appended and the cursor advanced to it. When capacity is
    /// exceeded the oldest entry is evicted and the cursor shifted so it
    /// still points at the entry just pushed.
    pub fn snapshot(&mut self, stack: &LayerStack) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(HistoryEntry::capture(stack));
        self.cursor = self.entries.len() - 1;
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
            self.cursor -= 1;
        }
    }

    /// Step the cursor back and return the entry to apply.
    pub fn undo(&mut self) -> Result<&HistoryEntry> {
        if !self.can_undo() {
            return Err(Error::NothingToUndo);
        }
        self.cursor -= 1;
        Ok(&self.entries[self.cursor])
    }

    /// Step the cursor forward and return the entry to apply.
    pub fn redo(&mut self) -> Result<&HistoryEntry> {
        if !self.can_redo() {
            return Err(Error::NothingToRedo);
        }
        self.cursor += 1;
        Ok(&self.entries[self.cursor])
    }
}
