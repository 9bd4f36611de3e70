//! In-memory canvas store - THE source of truth for all board data.
//!
//! Every edit goes through [`Document::transact`]. It handles:
//! - Shape, page, asset and preference records
//! - Selection and viewport (session state, never persisted)
//! - Undo/redo over committed transactions
//! - Change notification to listeners registered per [`StoreSlice`]
//!
//! A transaction works on a draft copy of the records. If the closure
//! returns an error the draft is dropped and nothing is notified, so
//! listeners only ever observe committed state.

use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};
use crate::note::{MIN_HEIGHT, MIN_WIDTH};
use crate::shapes::{AssetId, PageId, Point, Shape, ShapeId};
use crate::undo::UndoManager;

/// Version stamped into every snapshot
pub const SNAPSHOT_SCHEMA: u32 = 1;

/// A logical page of canvas content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub name: String,
}

impl Page {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PageId::new(),
            name: name.into(),
        }
    }
}

/// An image (or other binary) asset referenced by shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    /// Data URL
    pub src: String,
    pub w: u32,
    pub h: u32,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    #[default]
    Dark,
    System,
}

/// User preferences carried inside the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub color_scheme: ColorScheme,
    /// 0.0 disables animations
    pub animation_speed: f64,
    pub grid_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            color_scheme: ColorScheme::default(),
            animation_speed: 1.0,
            grid_mode: false,
        }
    }
}

/// Full persisted state of one project's canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub schema: u32,
    pub pages: Vec<Page>,
    pub current_page: PageId,
    /// Z-ordered, back to front
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Default for CanvasSnapshot {
    fn default() -> Self {
        let page = Page::new("Page 1");
        Self {
            schema: SNAPSHOT_SCHEMA,
            current_page: page.id,
            pages: vec![page],
            shapes: Vec::new(),
            assets: Vec::new(),
            preferences: Preferences::default(),
        }
    }
}

impl CanvasSnapshot {
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// Check the structural invariants a loaded snapshot must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(BoardError::format("snapshot has no pages"));
        }
        if self.page(self.current_page).is_none() {
            return Err(BoardError::format("current page is not in the page list"));
        }
        let mut seen = std::collections::HashSet::new();
        for shape in &self.shapes {
            if !seen.insert(shape.id) {
                return Err(BoardError::format(format!("duplicate shape id {}", shape.id)));
            }
            if self.page(shape.page).is_none() {
                return Err(BoardError::format(format!(
                    "{} belongs to unknown {}",
                    shape.id, shape.page
                )));
            }
            if let Some(note) = shape.as_note()
                && (note.w < MIN_WIDTH || note.h < MIN_HEIGHT)
            {
                return Err(BoardError::format(format!(
                    "note {} is smaller than {MIN_WIDTH}x{MIN_HEIGHT}",
                    shape.id
                )));
            }
        }
        Ok(())
    }
}

/// Named part of the store a listener can register against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreSlice {
    Shapes,
    Pages,
    Assets,
    Preferences,
    Selection,
}

impl StoreSlice {
    pub const ALL: [StoreSlice; 5] = [
        StoreSlice::Shapes,
        StoreSlice::Pages,
        StoreSlice::Assets,
        StoreSlice::Preferences,
        StoreSlice::Selection,
    ];
}

/// What a committed change touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreChange {
    slices: Vec<StoreSlice>,
}

impl StoreChange {
    fn all() -> Self {
        Self {
            slices: StoreSlice::ALL.to_vec(),
        }
    }

    fn add(&mut self, slice: StoreSlice) {
        if !self.slices.contains(&slice) {
            self.slices.push(slice);
        }
    }

    pub fn touches(&self, slice: StoreSlice) -> bool {
        self.slices.contains(&slice)
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

pub type ListenerId = u64;

type Callback = Box<dyn FnMut(&StoreChange, &Document)>;

struct Listener {
    id: ListenerId,
    slices: Vec<StoreSlice>,
    callback: Callback,
}

/// Mutable view handed to a transaction closure.
pub struct Transaction {
    draft: CanvasSnapshot,
    change: StoreChange,
}

impl Transaction {
    pub fn snapshot(&self) -> &CanvasSnapshot {
        &self.draft
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.draft.shape(id)
    }

    pub fn current_page(&self) -> PageId {
        self.draft.current_page
    }

    pub fn create_shape(&mut self, mut shape: Shape) -> Result<ShapeId> {
        if self.draft.page(shape.page).is_none() {
            return Err(BoardError::not_found("page", shape.page));
        }
        if self.draft.shape(shape.id).is_some() {
            return Err(BoardError::validation(format!("{} already exists", shape.id)));
        }
        clamp_note(&mut shape);
        let id = shape.id;
        self.draft.shapes.push(shape);
        self.change.add(StoreSlice::Shapes);
        Ok(id)
    }

    /// Mutate one shape in place. Note minimums are re-applied afterwards.
    pub fn update_shape(&mut self, id: ShapeId, f: impl FnOnce(&mut Shape)) -> Result<()> {
        let shape = self
            .draft
            .shapes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| BoardError::not_found("shape", id))?;
        f(shape);
        shape.id = id;
        clamp_note(shape);
        self.change.add(StoreSlice::Shapes);
        Ok(())
    }

    /// Returns how many shapes were removed
    pub fn delete_shapes(&mut self, ids: &[ShapeId]) -> usize {
        let before = self.draft.shapes.len();
        self.draft.shapes.retain(|s| !ids.contains(&s.id));
        let removed = before - self.draft.shapes.len();
        if removed > 0 {
            self.change.add(StoreSlice::Shapes);
        }
        removed
    }

    /// Move shapes to the top of the z-order, keeping their relative order
    pub fn bring_to_front(&mut self, ids: &[ShapeId]) {
        let (mut front, back): (Vec<_>, Vec<_>) = std::mem::take(&mut self.draft.shapes)
            .into_iter()
            .partition(|s| ids.contains(&s.id));
        let mut shapes = back;
        shapes.append(&mut front);
        self.draft.shapes = shapes;
        self.change.add(StoreSlice::Shapes);
    }

    pub fn create_page(&mut self, name: impl Into<String>) -> PageId {
        let page = Page::new(name);
        let id = page.id;
        self.draft.pages.push(page);
        self.change.add(StoreSlice::Pages);
        id
    }

    pub fn rename_page(&mut self, id: PageId, name: impl Into<String>) -> Result<()> {
        let page = self
            .draft
            .pages
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BoardError::not_found("page", id))?;
        page.name = name.into();
        self.change.add(StoreSlice::Pages);
        Ok(())
    }

    /// Delete a page and every shape on it. The last page cannot go.
    pub fn delete_page(&mut self, id: PageId) -> Result<()> {
        if self.draft.page(id).is_none() {
            return Err(BoardError::not_found("page", id));
        }
        if self.draft.pages.len() == 1 {
            return Err(BoardError::validation("a project needs at least one page"));
        }
        self.draft.pages.retain(|p| p.id != id);
        let before = self.draft.shapes.len();
        self.draft.shapes.retain(|s| s.page != id);
        if self.draft.shapes.len() != before {
            self.change.add(StoreSlice::Shapes);
        }
        if self.draft.current_page == id {
            self.draft.current_page = self.draft.pages[0].id;
        }
        self.change.add(StoreSlice::Pages);
        Ok(())
    }

    pub fn set_current_page(&mut self, id: PageId) -> Result<()> {
        if self.draft.page(id).is_none() {
            return Err(BoardError::not_found("page", id));
        }
        if self.draft.current_page != id {
            self.draft.current_page = id;
            self.change.add(StoreSlice::Pages);
        }
        Ok(())
    }

    pub fn create_asset(&mut self, asset: Asset) -> AssetId {
        let id = asset.id;
        self.draft.assets.push(asset);
        self.change.add(StoreSlice::Assets);
        id
    }

    pub fn update_preferences(&mut self, f: impl FnOnce(&mut Preferences)) {
        f(&mut self.draft.preferences);
        self.change.add(StoreSlice::Preferences);
    }
}

fn clamp_note(shape: &mut Shape) {
    if let Some(note) = shape.as_note_mut() {
        note.w = MIN_WIDTH.max(note.w);
        note.h = MIN_HEIGHT.max(note.h);
    }
}

/// The canvas store
pub struct Document {
    state: CanvasSnapshot,
    selection: Vec<ShapeId>,
    viewport_center: Point,
    undo: UndoManager,
    listeners: Vec<Listener>,
    next_listener: ListenerId,
    /// Whether there are unsaved changes
    dirty: bool,
}

impl Document {
    /// Create a new document with a single empty page
    pub fn new() -> Self {
        Self::with_state(CanvasSnapshot::default())
    }

    pub fn with_history(max_history: usize) -> Self {
        let mut doc = Self::new();
        doc.undo = UndoManager::new(max_history);
        doc
    }

    fn with_state(state: CanvasSnapshot) -> Self {
        Self {
            state,
            selection: Vec::new(),
            viewport_center: Point::default(),
            undo: UndoManager::default(),
            listeners: Vec::new(),
            next_listener: 1,
            dirty: false,
        }
    }

    // --- Reads ---

    pub fn snapshot(&self) -> &CanvasSnapshot {
        &self.state
    }

    /// Owned copy of the full state, for persistence
    pub fn get_snapshot(&self) -> CanvasSnapshot {
        self.state.clone()
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.state.shape(id)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.state.shapes.iter()
    }

    pub fn current_page_shapes(&self) -> impl Iterator<Item = &Shape> {
        let page = self.state.current_page;
        self.state.shapes.iter().filter(move |s| s.page == page)
    }

    pub fn pages(&self) -> &[Page] {
        &self.state.pages
    }

    pub fn current_page(&self) -> PageId {
        self.state.current_page
    }

    pub fn preferences(&self) -> &Preferences {
        &self.state.preferences
    }

    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.state.assets.iter().find(|a| a.id == id)
    }

    pub fn selected_ids(&self) -> &[ShapeId] {
        &self.selection
    }

    pub fn selected_shapes(&self) -> Vec<&Shape> {
        self.selection.iter().filter_map(|id| self.shape(*id)).collect()
    }

    pub fn viewport_center(&self) -> Point {
        self.viewport_center
    }

    pub fn set_viewport_center(&mut self, center: Point) {
        self.viewport_center = center;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    // --- Writes ---

    /// Run `f` against a draft of the records and commit it if it succeeds.
    pub fn transact<T>(&mut self, f: impl FnOnce(&mut Transaction) -> Result<T>) -> Result<T> {
        let mut tx = Transaction {
            draft: self.state.clone(),
            change: StoreChange::default(),
        };
        let out = f(&mut tx)?;
        let Transaction { draft, mut change } = tx;
        if change.is_empty() {
            return Ok(out);
        }

        let previous = std::mem::replace(&mut self.state, draft);
        self.undo.save_state(previous);
        self.dirty = true;
        if self.prune_selection() {
            change.add(StoreSlice::Selection);
        }
        self.notify(&change);
        Ok(out)
    }

    /// Replace the selection. Ids not on the current page are ignored.
    pub fn select(&mut self, ids: &[ShapeId]) {
        let page = self.state.current_page;
        let next: Vec<ShapeId> = ids
            .iter()
            .copied()
            .filter(|id| self.shape(*id).is_some_and(|s| s.page == page))
            .collect();
        if next != self.selection {
            self.selection = next;
            let mut change = StoreChange::default();
            change.add(StoreSlice::Selection);
            self.notify(&change);
        }
    }

    pub fn select_all(&mut self) {
        let ids: Vec<ShapeId> = self.current_page_shapes().map(|s| s.id).collect();
        self.select(&ids);
    }

    pub fn select_none(&mut self) {
        self.select(&[]);
    }

    pub fn undo(&mut self) -> bool {
        match self.undo.undo(&self.state) {
            Some(prev) => {
                self.restore(prev);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.undo.redo(&self.state) {
            Some(next) => {
                self.restore(next);
                true
            }
            None => false,
        }
    }

    /// Replace the whole state in one step. Invalid snapshots are rejected
    /// before anything changes. History does not survive a load.
    pub fn load_snapshot(&mut self, snapshot: CanvasSnapshot) -> Result<()> {
        snapshot.validate()?;
        self.undo.clear();
        self.restore(snapshot);
        Ok(())
    }

    fn restore(&mut self, state: CanvasSnapshot) {
        self.state = state;
        self.dirty = true;
        self.prune_selection();
        self.notify(&StoreChange::all());
    }

    /// Drop selected ids that no longer resolve on the current page
    fn prune_selection(&mut self) -> bool {
        let page = self.state.current_page;
        let state = &self.state;
        let before = self.selection.len();
        self.selection
            .retain(|id| state.shape(*id).is_some_and(|s| s.page == page));
        before != self.selection.len()
    }

    // --- Listeners ---

    /// Register a callback for changes touching any of `slices`.
    ///
    /// Callbacks run after commit and see the committed document.
    pub fn subscribe(
        &mut self,
        slices: &[StoreSlice],
        callback: impl FnMut(&StoreChange, &Document) + 'static,
    ) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push(Listener {
            id,
            slices: slices.to_vec(),
            callback: Box::new(callback),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        before != self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&mut self, change: &StoreChange) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners
            .iter_mut()
            .filter(|l| l.slices.iter().any(|s| change.touches(*s)))
        {
            (listener.callback)(change, self);
        }
        self.listeners = listeners;
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::note::NoteProps;
    use crate::shapes::ShapeKind;

    fn add_text(doc: &mut Document, text: &str) -> ShapeId {
        let page = doc.current_page();
        doc.transact(|tx| {
            tx.create_shape(Shape::new(page, 0.0, 0.0, ShapeKind::Text { text: text.into() }))
        })
        .unwrap()
    }

    #[test]
    fn failed_transaction_changes_nothing() {
        let mut doc = Document::new();
        let id = add_text(&mut doc, "keep");
        let before = doc.get_snapshot();
        let result: Result<()> = doc.transact(|tx| {
            tx.delete_shapes(&[id]);
            Err(BoardError::validation("abort"))
        });
        assert!(result.is_err());
        assert_eq!(doc.get_snapshot(), before);
    }

    #[test]
    fn listeners_fire_once_per_commit_for_their_slice() {
        let mut doc = Document::new();
        let shapes = Rc::new(Cell::new(0));
        let prefs = Rc::new(Cell::new(0));
        let s = shapes.clone();
        doc.subscribe(&[StoreSlice::Shapes], move |_, _| s.set(s.get() + 1));
        let p = prefs.clone();
        let prefs_listener = doc.subscribe(&[StoreSlice::Preferences], move |_, _| p.set(p.get() + 1));

        add_text(&mut doc, "a");
        assert_eq!((shapes.get(), prefs.get()), (1, 0));

        doc.transact(|tx| {
            tx.update_preferences(|p| p.grid_mode = true);
            Ok(())
        })
        .unwrap();
        assert_eq!((shapes.get(), prefs.get()), (1, 1));

        assert!(doc.unsubscribe(prefs_listener));
        doc.transact(|tx| {
            tx.update_preferences(|p| p.grid_mode = false);
            Ok(())
        })
        .unwrap();
        assert_eq!(prefs.get(), 1);
    }

    #[test]
    fn listener_sees_committed_state() {
        let mut doc = Document::new();
        let seen = Rc::new(Cell::new(0usize));
        let s = seen.clone();
        doc.subscribe(&[StoreSlice::Shapes], move |_, doc| s.set(doc.shapes().count()));
        add_text(&mut doc, "a");
        add_text(&mut doc, "b");
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn notes_are_clamped_on_write() {
        let mut doc = Document::new();
        let page = doc.current_page();
        let id = doc
            .transact(|tx| {
                tx.create_shape(Shape::new(
                    page,
                    0.0,
                    0.0,
                    ShapeKind::Note(NoteProps {
                        w: 10.0,
                        h: 10.0,
                        content: String::new(),
                    }),
                ))
            })
            .unwrap();
        let note = doc.shape(id).unwrap().as_note().unwrap();
        assert_eq!((note.w, note.h), (MIN_WIDTH, MIN_HEIGHT));
    }

    #[test]
    fn deleting_shapes_prunes_selection() {
        let mut doc = Document::new();
        let a = add_text(&mut doc, "a");
        let b = add_text(&mut doc, "b");
        doc.select(&[a, b]);
        doc.transact(|tx| Ok(tx.delete_shapes(&[a]))).unwrap();
        assert_eq!(doc.selected_ids(), &[b]);
    }

    #[test]
    fn last_page_cannot_be_deleted() {
        let mut doc = Document::new();
        let page = doc.current_page();
        let err = doc.transact(|tx| tx.delete_page(page)).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(doc.pages().len(), 1);
    }

    #[test]
    fn undo_and_redo() {
        let mut doc = Document::new();
        let id = add_text(&mut doc, "a");
        assert!(doc.undo());
        assert!(doc.shape(id).is_none());
        assert!(doc.redo());
        assert!(doc.shape(id).is_some());
        assert!(!doc.redo());
    }

    #[test]
    fn invalid_snapshot_is_rejected_untouched() {
        let mut doc = Document::new();
        add_text(&mut doc, "a");
        let before = doc.get_snapshot();
        let mut bad = before.clone();
        bad.pages.clear();
        assert!(matches!(doc.load_snapshot(bad), Err(BoardError::Format(_))));
        assert_eq!(doc.get_snapshot(), before);
    }
}
