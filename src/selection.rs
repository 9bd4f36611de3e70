//! Which contextual toolbar sections apply to the current selection.

use std::cell::Cell;
use std::rc::Rc;

use crate::document::{Document, ListenerId, StoreSlice};
use crate::shapes::{Shape, NOTE_TYPE};

const FILLABLE: &[&str] = &["geo", "draw"];
const DASHABLE: &[&str] = &["geo", "line", "arrow", "draw"];
const FONT_STYLED: &[&str] = &["text", "note", "geo"];
const ALIGNABLE: &[&str] = &["text", "note", "geo"];

/// Toolbar sections to show for a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolbarContext {
    /// Exactly one shape selected and it is a rich-text note
    pub is_single_note: bool,
    pub has_fillable: bool,
    pub has_dashable: bool,
    pub has_font_styled: bool,
    pub has_alignable: bool,
}

impl ToolbarContext {
    pub fn from_selection(selected: &[&Shape]) -> Self {
        let is_single_note = selected.len() == 1 && selected[0].type_tag() == NOTE_TYPE;
        // Note formatting replaces the style sections entirely
        let styled = !selected.is_empty() && !is_single_note;
        let any_in = |set: &[&str]| styled && selected.iter().any(|s| set.contains(&s.type_tag()));
        Self {
            is_single_note,
            has_fillable: any_in(FILLABLE),
            has_dashable: any_in(DASHABLE),
            has_font_styled: any_in(FONT_STYLED),
            has_alignable: any_in(ALIGNABLE),
        }
    }

    pub fn from_document(doc: &Document) -> Self {
        Self::from_selection(&doc.selected_shapes())
    }
}

/// Keeps a [`ToolbarContext`] current by listening to the store.
pub struct SelectionObserver {
    listener: ListenerId,
    current: Rc<Cell<ToolbarContext>>,
}

impl SelectionObserver {
    /// Register against the selection and shape slices of `doc`
    pub fn attach(doc: &mut Document) -> Self {
        let current = Rc::new(Cell::new(ToolbarContext::from_document(doc)));
        let slot = current.clone();
        let listener = doc.subscribe(&[StoreSlice::Selection, StoreSlice::Shapes], move |_, doc| {
            slot.set(ToolbarContext::from_document(doc));
        });
        Self { listener, current }
    }

    pub fn current(&self) -> ToolbarContext {
        self.current.get()
    }

    pub fn detach(self, doc: &mut Document) {
        doc.unsubscribe(self.listener);
    }
}
