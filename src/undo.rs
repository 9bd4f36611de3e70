//! Undo/redo over whole-store snapshots.
//!
//! Each committed transaction pushes the state it replaced. Snapshots are
//! plain clones of the record set; a note board holds few enough records
//! that this stays cheap next to the rich-text content itself.

use crate::document::CanvasSnapshot;

/// Manages undo/redo with document snapshots
#[derive(Debug)]
pub struct UndoManager {
    undo_stack: Vec<CanvasSnapshot>,
    redo_stack: Vec<CanvasSnapshot>,
    max_history: usize,
}

impl UndoManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history,
        }
    }

    /// Record the state a mutation is about to replace
    pub fn save_state(&mut self, previous: CanvasSnapshot) {
        self.undo_stack.push(previous);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_history {
            let excess = self.undo_stack.len() - self.max_history;
            self.undo_stack.drain(..excess);
        }
    }

    /// Step back; `current` moves onto the redo stack
    pub fn undo(&mut self, current: &CanvasSnapshot) -> Option<CanvasSnapshot> {
        let prev = self.undo_stack.pop()?;
        self.redo_stack.push(current.clone());
        Some(prev)
    }

    /// Step forward; `current` moves onto the undo stack
    pub fn redo(&mut self, current: &CanvasSnapshot) -> Option<CanvasSnapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current.clone());
        Some(next)
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

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_named(name: &str) -> CanvasSnapshot {
        let mut snap = CanvasSnapshot::default();
        snap.pages[0].name = name.to_string();
        snap
    }

    #[test]
    fn history_is_bounded() {
        let mut undo = UndoManager::new(2);
        for name in ["a", "b", "c"] {
            undo.save_state(snapshot_named(name));
        }
        assert_eq!(undo.undo_count(), 2);
        let current = snapshot_named("d");
        assert_eq!(undo.undo(&current).unwrap().pages[0].name, "c");
    }

    #[test]
    fn new_state_clears_redo() {
        let mut undo = UndoManager::default();
        undo.save_state(snapshot_named("a"));
        let prev = undo.undo(&snapshot_named("b")).unwrap();
        assert!(undo.can_redo());
        undo.save_state(prev);
        assert!(!undo.can_redo());
    }
}
