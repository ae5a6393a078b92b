//! Linear undo/redo history of site snapshots

use std::collections::VecDeque;

use tracing::debug;

use crate::site::Site;

/// Default number of undo steps retained
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Past, present and future snapshots of the site being edited.
///
/// History is linear: pushing a new present after an undo discards
/// everything that could have been redone.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    /// Oldest first
    past: VecDeque<Site>,
    /// Current snapshot, empty until the first push
    present: Option<Site>,
    /// Next redo first
    future: VecDeque<Site>,
    /// Maximum length of `past`
    capacity: usize,
}

impl HistoryStack {
    /// Create an empty history retaining up to `capacity` undo steps
    pub fn new(capacity: usize) -> Self {
        Self {
            past: VecDeque::new(),
            present: None,
            future: VecDeque::new(),
            capacity,
        }
    }

    /// Adopt a new present snapshot.
    ///
    /// Returns `false` when the snapshot equals the current present and
    /// history was left unchanged.
    pub fn set_present(&mut self, site: Site) -> bool {
        let Some(current) = self.present.take() else {
            self.present = Some(site);
            return true;
        };

        if current == site {
            self.present = Some(current);
            return false;
        }

        self.past.push_back(current);
        while self.past.len() > self.capacity {
            self.past.pop_front();
            debug!(capacity = self.capacity, "Evicted oldest history entry");
        }

        self.present = Some(site);
        if !self.future.is_empty() {
            debug!(discarded = self.future.len(), "Cleared redo history");
            self.future.clear();
        }

        true
    }

    /// Step back one snapshot, returning the restored present
    pub fn undo(&mut self) -> Option<Site> {
        let previous = self.past.pop_back()?;

        if let Some(current) = self.present.replace(previous.clone()) {
            self.future.push_front(current);
        }

        debug!(past = self.past.len(), future = self.future.len(), "Undo");
        Some(previous)
    }

    /// Step forward one snapshot, returning the restored present
    pub fn redo(&mut self) -> Option<Site> {
        let next = self.future.pop_front()?;

        if let Some(current) = self.present.replace(next.clone()) {
            self.past.push_back(current);
        }

        debug!(past = self.past.len(), future = self.future.len(), "Redo");
        Some(next)
    }

    /// Drop all snapshots
    pub fn clear_history(&mut self) {
        self.past.clear();
        self.present = None;
        self.future.clear();
    }

    pub fn present(&self) -> Option<&Site> {
        self.present.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}
