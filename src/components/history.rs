use std::collections::VecDeque;

use crate::canvas::{PixelBuffer, PixelSurface};

/// Default number of snapshots kept before the oldest is evicted.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Immutable full copy of the texture at one point in time.
#[derive(Clone, Debug)]
pub struct HistorySnapshot {
    description: String,
    buffer: PixelBuffer,
}

impl HistorySnapshot {
    pub fn capture(surface: &PixelSurface, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            buffer: surface.read().clone(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn restore_into(&self, surface: &mut PixelSurface) {
        surface.write(self.buffer.clone());
    }

    pub fn memory_size(&self) -> usize {
        self.buffer.as_raw().len()
    }
}

// ============================================================================
// HISTORY STACK
// ============================================================================

/// Linear snapshot history with a cursor.
///
/// `entries[cursor]` always equals the visible buffer once at least one
/// snapshot exists. Pushing after an undo drops everything past the cursor,
/// so there is never a redo tree.
#[derive(Debug)]
pub struct HistoryStack {
    entries: VecDeque<HistorySnapshot>,
    cursor: usize,
    max_history_size: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryStack {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_history_size: max_history_size.max(1),
        }
    }

    /// Record the current surface as a new history entry.
    pub fn snapshot(&mut self, surface: &PixelSurface, description: &str) {
        // Drop the redo tail.
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }

        self.entries.push_back(HistorySnapshot::capture(surface, description));
        self.cursor = self.entries.len() - 1;

        while self.entries.len() > self.max_history_size {
            if let Some(evicted) = self.entries.pop_front() {
                log::debug!("History evicted '{}'", evicted.description());
            }
            self.cursor = self.cursor.saturating_sub(1);
        }
        log::debug!(
            "History push '{}' ({}/{})",
            description,
            self.entries.len(),
            self.max_history_size
        );
    }

    /// Step back one entry. Returns the description of the undone action, or
    /// `None` when already at the oldest entry.
    pub fn undo(&mut self, surface: &mut PixelSurface) -> Option<String> {
        if !self.can_undo() {
            return None;
        }
        let undone = self.entries[self.cursor].description().to_string();
        self.cursor -= 1;
        self.entries[self.cursor].restore_into(surface);
        Some(undone)
    }

    /// Step forward one entry. Returns the description of the redone action,
    /// or `None` when already at the newest entry.
    pub fn redo(&mut self, surface: &mut PixelSurface) -> Option<String> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        let entry = &self.entries[self.cursor];
        entry.restore_into(surface);
        Some(entry.description().to_string())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor + 1 < self.entries.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            Some(self.entries[self.cursor].description())
        } else {
            None
        }
    }

    pub fn redo_description(&self) -> Option<&str> {
        if self.can_redo() {
            Some(self.entries[self.cursor + 1].description())
        } else {
            None
        }
    }

    /// Descriptions from oldest to newest.
    pub fn descriptions(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.description()).collect()
    }

    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.entries.get(self.cursor)
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

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    pub fn memory_usage(&self) -> usize {
        self.entries.iter().map(HistorySnapshot::memory_size).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn paint(surface: &mut PixelSurface, v: u8) {
        surface.buffer_mut().put_pixel(0, 0, Rgba([v, v, v, 255]));
    }

    fn first(surface: &PixelSurface) -> u8 {
        surface.get_pixel(0, 0).unwrap().0[0]
    }

    #[test]
    fn undo_redo_walks_the_cursor() {
        let mut surface = PixelSurface::new(2, 2);
        let mut history = HistoryStack::new(10);
        history.snapshot(&surface, "Open");
        for v in 1..=3 {
            paint(&mut surface, v);
            history.snapshot(&surface, "Paint");
        }
        assert_eq!(history.undo(&mut surface).as_deref(), Some("Paint"));
        assert_eq!(first(&surface), 2);
        history.undo(&mut surface);
        assert_eq!(first(&surface), 1);
        history.redo(&mut surface);
        assert_eq!(first(&surface), 2);
    }

    #[test]
    fn k_edits_then_k_undos_restores_original_bytes() {
        let mut surface = PixelSurface::new(4, 4);
        surface.buffer_mut().fill(Rgba([9, 8, 7, 255]));
        let original = surface.read().clone();
        let mut history = HistoryStack::default();
        history.snapshot(&surface, "Open");

        let k = 7;
        for i in 0..k {
            surface.buffer_mut().put_pixel(i % 4, i / 4, Rgba([i as u8, 0, 0, 10]));
            history.snapshot(&surface, "Edit");
        }
        for _ in 0..k {
            assert!(history.undo(&mut surface).is_some());
        }
        assert_eq!(surface.read(), &original);
        assert!(!history.can_undo());
    }

    #[test]
    fn bounds_are_no_ops() {
        let mut surface = PixelSurface::new(1, 1);
        let mut history = HistoryStack::default();
        assert_eq!(history.undo(&mut surface), None);
        assert_eq!(history.redo(&mut surface), None);

        history.snapshot(&surface, "Open");
        assert_eq!(history.undo(&mut surface), None);
        assert_eq!(history.redo(&mut surface), None);
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut surface = PixelSurface::new(1, 1);
        let mut history = HistoryStack::new(50);
        for v in 0..51u8 {
            paint(&mut surface, v);
            history.snapshot(&surface, &format!("step {v}"));
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.cursor(), 49);
        assert_eq!(history.descriptions()[0], "step 1");

        // Undo all the way down lands on the oldest surviving state.
        while history.undo(&mut surface).is_some() {}
        assert_eq!(first(&surface), 1);
    }

    #[test]
    fn push_after_undo_discards_redo() {
        let mut surface = PixelSurface::new(1, 1);
        let mut history = HistoryStack::default();
        history.snapshot(&surface, "Open");
        paint(&mut surface, 1);
        history.snapshot(&surface, "A");
        paint(&mut surface, 2);
        history.snapshot(&surface, "B");

        history.undo(&mut surface);
        assert!(history.can_redo());
        paint(&mut surface, 3);
        history.snapshot(&surface, "C");

        assert!(!history.can_redo());
        assert_eq!(history.redo(&mut surface), None);
        assert_eq!(history.descriptions(), vec!["Open", "A", "C"]);
        assert_eq!(history.undo_description(), Some("C"));
    }
}
