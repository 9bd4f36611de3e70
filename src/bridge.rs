//! Embedded rich-text editor for one mounted note.
//!
//! The shape store holds the note's serialized content; the bridge holds a
//! live rich-text instance seeded from it. Every local change is serialized
//! and written straight back to the store in its own transaction, so the two
//! never disagree once a handler returns. One bridge per mounted note, never
//! shared; it owns the note's bus subscription and gives it up on unmount.

use tracing::{debug, warn};

use crate::bus::{CommandBus, NoteCommand, Subscription};
use crate::document::Document;
use crate::error::{BoardError, Result};
use crate::markup::RichText;
use crate::shapes::{Shape, ShapeId, ShapeKind};

/// Pointer events the canvas may route through a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    PointerDown,
    PointerMove,
    PointerUp,
    DoubleClick,
}

/// Where inside the note card the event landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteRegion {
    Header,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub region: NoteRegion,
}

/// Whether the canvas engine still gets to see an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

pub struct EditorBridge<R: RichText> {
    shape: ShapeId,
    editor: R,
    subscription: Subscription,
    /// Markup last written to (or read from) the store
    synced: String,
}

impl<R: RichText> EditorBridge<R> {
    /// Seed an editor from the shape's content and subscribe to its commands
    pub fn mount(shape: &Shape, bus: &mut CommandBus) -> Self {
        let content = shape.as_note().map(|n| n.content.as_str()).unwrap_or_default();
        let editor = R::from_markup(content);
        let subscription = bus.subscribe(shape.id);
        debug!(shape = %shape.id, "note editor mounted");
        Self {
            shape: shape.id,
            editor,
            subscription,
            synced: content.to_string(),
        }
    }

    pub fn shape_id(&self) -> ShapeId {
        self.shape
    }

    pub fn editor(&self) -> &R {
        &self.editor
    }

    /// Apply a local edit (typing, paste) and write it back
    pub fn edit(&mut self, doc: &mut Document, f: impl FnOnce(&mut R)) -> Result<()> {
        f(&mut self.editor);
        self.write_back(doc)
    }

    /// Apply one bus command. Returns whether the document changed.
    pub fn apply_command(&mut self, doc: &mut Document, command: &NoteCommand) -> Result<bool> {
        if command.id != self.shape {
            return Ok(false);
        }
        let Some(format) = command.to_format() else {
            warn!(shape = %self.shape, action = ?command.action, "command without usable value ignored");
            return Ok(false);
        };
        if !self.editor.apply(&format) {
            return Ok(false);
        }
        self.write_back(doc)?;
        Ok(true)
    }

    /// Drain every queued command for this note. Returns how many changed it.
    pub fn pump(&mut self, doc: &mut Document) -> Result<usize> {
        let mut applied = 0;
        while let Some(command) = self.subscription.try_next() {
            if self.apply_command(doc, &command)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Stop pointer-down and double-click inside the content so in-place
    /// editing wins over canvas drag and selection.
    pub fn intercept(&self, event: &PointerEvent) -> Propagation {
        match (event.region, event.kind) {
            (NoteRegion::Content, PointerKind::PointerDown | PointerKind::DoubleClick) => {
                Propagation::Stop
            }
            _ => Propagation::Continue,
        }
    }

    /// Re-seed from the store when its content changed underneath us (undo,
    /// snapshot load). Returns whether a re-seed happened.
    pub fn refresh(&mut self, doc: &Document) -> Result<bool> {
        let shape = doc
            .shape(self.shape)
            .ok_or_else(|| BoardError::not_found("shape", self.shape))?;
        let content = shape.as_note().map(|n| n.content.as_str()).unwrap_or_default();
        if content == self.synced {
            return Ok(false);
        }
        self.editor = R::from_markup(content);
        self.synced = content.to_string();
        Ok(true)
    }

    /// Release the subscription and the editor instance
    pub fn unmount(self, bus: &mut CommandBus) {
        bus.unsubscribe(self.subscription.id());
        debug!(shape = %self.shape, "note editor unmounted");
    }

    fn write_back(&mut self, doc: &mut Document) -> Result<()> {
        let markup = self.editor.to_markup();
        if markup == self.synced {
            return Ok(());
        }
        doc.transact(|tx| {
            tx.update_shape(self.shape, |shape| {
                if let ShapeKind::Note(props) = &mut shape.props {
                    props.content = markup.clone();
                }
            })
        })?;
        self.synced = markup;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::NoteAction;
    use crate::markup::MarkupDocument;
    use crate::note::NoteShapeUtil;

    fn mounted_note(doc: &mut Document, bus: &mut CommandBus, content: &str) -> EditorBridge<MarkupDocument> {
        let util = NoteShapeUtil::default();
        let mut shape = util.create_at(doc.current_page(), Default::default());
        shape.as_note_mut().unwrap().content = content.to_string();
        let id = doc.transact(|tx| tx.create_shape(shape)).unwrap();
        util.render(doc.shape(id).unwrap(), bus).unwrap()
    }

    fn content(doc: &Document, id: ShapeId) -> String {
        doc.shape(id).unwrap().as_note().unwrap().content.clone()
    }

    #[test]
    fn local_edit_writes_back_immediately() {
        let mut doc = Document::new();
        let mut bus = CommandBus::new();
        let mut bridge = mounted_note(&mut doc, &mut bus, "<p>Hel</p>");
        bridge.edit(&mut doc, |e| e.insert_text("lo")).unwrap();
        assert_eq!(content(&doc, bridge.shape_id()), "<p>Hello</p>");
    }

    #[test]
    fn bus_command_is_applied_and_persisted() {
        let mut doc = Document::new();
        let mut bus = CommandBus::new();
        let mut bridge = mounted_note(&mut doc, &mut bus, "<p>x</p>");
        bus.publish(NoteCommand::new(bridge.shape_id(), NoteAction::Bold));
        assert_eq!(bridge.pump(&mut doc).unwrap(), 1);
        assert_eq!(content(&doc, bridge.shape_id()), "<p><strong>x</strong></p>");
    }

    #[test]
    fn content_pointer_events_stop() {
        let mut doc = Document::new();
        let mut bus = CommandBus::new();
        let bridge = mounted_note(&mut doc, &mut bus, "");
        let ev = |kind, region| PointerEvent { kind, region };
        assert_eq!(bridge.intercept(&ev(PointerKind::PointerDown, NoteRegion::Content)), Propagation::Stop);
        assert_eq!(bridge.intercept(&ev(PointerKind::DoubleClick, NoteRegion::Content)), Propagation::Stop);
        assert_eq!(bridge.intercept(&ev(PointerKind::PointerMove, NoteRegion::Content)), Propagation::Continue);
        assert_eq!(bridge.intercept(&ev(PointerKind::PointerDown, NoteRegion::Header)), Propagation::Continue);
    }

    #[test]
    fn refresh_reseeds_after_undo() {
        let mut doc = Document::new();
        let mut bus = CommandBus::new();
        let mut bridge = mounted_note(&mut doc, &mut bus, "<p>a</p>");
        bridge.edit(&mut doc, |e| e.insert_text("b")).unwrap();
        assert!(doc.undo());
        assert!(bridge.refresh(&doc).unwrap());
        assert_eq!(bridge.editor().to_markup(), "<p>a</p>");
    }

    #[test]
    fn unmount_releases_subscription() {
        let mut doc = Document::new();
        let mut bus = CommandBus::new();
        let bridge = mounted_note(&mut doc, &mut bus, "");
        let id = bridge.shape_id();
        bridge.unmount(&mut bus);
        assert!(!bus.is_subscribed(id));
    }

    #[test]
    fn write_back_to_deleted_shape_fails() {
        let mut doc = Document::new();
        let mut bus = CommandBus::new();
        let mut bridge = mounted_note(&mut doc, &mut bus, "<p>a</p>");
        let id = bridge.shape_id();
        doc.transact(|tx| Ok(tx.delete_shapes(&[id]))).unwrap();
        let err = bridge.edit(&mut doc, |e| e.insert_text("b")).unwrap_err();
        assert!(matches!(err, BoardError::NotFound { .. }));
    }
}
