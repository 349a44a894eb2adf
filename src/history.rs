use std::collections::VecDeque;

use crate::document::Frame;

/// Default number of snapshots kept.
pub const DEFAULT_UNDO_DEPTH: usize = 20;

/// Bounded snapshot stack over the frame array.
///
/// Every entry is a deep copy of all frames (bitmaps included) taken just before
/// a raster or layer-structure mutation. There is no redo.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    snapshots: VecDeque<Vec<Frame>>,
    /// Maximum history size
    max_size: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

impl UndoHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(max_size),
            max_size: max_size.max(1),
        }
    }

    /// Records `frames` as the state to return to; evicts the oldest entry when full.
    pub fn push_snapshot(&mut self, frames: &[Frame]) {
        if self.snapshots.len() == self.max_size {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(frames.to_vec());
    }

    /// Pops the latest snapshot.
    pub fn undo(&mut self) -> Option<Vec<Frame>> {
        let frames = self.snapshots.pop_back();
        if frames.is_some() {
            log::debug!("undo: {} snapshot(s) left", self.snapshots.len());
        }
        frames
    }

    pub fn can_undo(&self) -> bool {
        !self.snapshots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
