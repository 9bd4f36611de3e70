//! The board root: one live canvas with its mounted note editors.
//!
//! `Board` owns the document, the command bus, the selection observer and
//! one editor bridge per note on the current page. Every operation ends with
//! a render pass (`sync_mounts`) that mounts editors for new notes, unmounts
//! editors whose note went away, and re-seeds editors whose stored content
//! changed under them.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::bridge::{EditorBridge, PointerEvent, Propagation};
use crate::bus::{CommandBus, Delivery, NoteAction, NoteCommand};
use crate::document::{Asset, CanvasSnapshot, ColorScheme, Document};
use crate::error::{BoardError, Result};
use crate::markup::{MarkupDocument, RichText};
use crate::note::{NoteProps, NoteShapeUtil, ResizePolicy};
use crate::pages::{PageController, RenameBuffer};
use crate::selection::{SelectionObserver, ToolbarContext};
use crate::shapes::{PageId, Point, Shape, ShapeId, ShapeKind};

/// Offset applied to duplicated shapes
const DUPLICATE_OFFSET: f64 = 16.0;

#[derive(Debug, Clone, Copy)]
pub struct BoardOptions {
    pub resize_policy: ResizePolicy,
    pub max_pages: usize,
    pub undo_history: usize,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            resize_policy: ResizePolicy::default(),
            max_pages: crate::pages::MAX_PAGES,
            undo_history: 100,
        }
    }
}

pub struct Board<R: RichText = MarkupDocument> {
    doc: Document,
    bus: CommandBus,
    notes: NoteShapeUtil,
    pages: PageController,
    bridges: BTreeMap<ShapeId, EditorBridge<R>>,
    selection: SelectionObserver,
}

impl<R: RichText> Board<R> {
    /// Mount a board over `doc`
    pub fn new(mut doc: Document, options: BoardOptions) -> Self {
        let selection = SelectionObserver::attach(&mut doc);
        let mut board = Self {
            doc,
            bus: CommandBus::new(),
            notes: NoteShapeUtil::new(options.resize_policy),
            pages: PageController::new(options.max_pages),
            bridges: BTreeMap::new(),
            selection,
        };
        board.sync_mounts();
        board
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn snapshot(&self) -> CanvasSnapshot {
        self.doc.get_snapshot()
    }

    pub fn is_dirty(&self) -> bool {
        self.doc.is_dirty()
    }

    pub fn mark_clean(&mut self) {
        self.doc.mark_clean();
    }

    pub fn toolbar(&self) -> ToolbarContext {
        self.selection.current()
    }

    pub fn bridge(&self, id: ShapeId) -> Option<&EditorBridge<R>> {
        self.bridges.get(&id)
    }

    pub fn mounted_notes(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.bridges.keys().copied()
    }

    /// Tear down every editor and observer, drop the current document and
    /// mount over `doc` instead
    pub fn remount(&mut self, mut doc: Document) {
        for (_, bridge) in std::mem::take(&mut self.bridges) {
            bridge.unmount(&mut self.bus);
        }
        let observer = SelectionObserver::attach(&mut doc);
        std::mem::replace(&mut self.selection, observer).detach(&mut self.doc);
        drop(std::mem::replace(&mut self.doc, doc));
        self.bus = CommandBus::new();
        self.sync_mounts();
    }

    // --- Render pass ---

    /// Bring mounted editors in line with the notes on the current page
    pub fn sync_mounts(&mut self) {
        let page = self.doc.current_page();
        let live: Vec<&Shape> = self
            .doc
            .current_page_shapes()
            .filter(|s| s.is_note())
            .collect();

        let gone: Vec<ShapeId> = self
            .bridges
            .keys()
            .copied()
            .filter(|id| !live.iter().any(|s| s.id == *id))
            .collect();
        let fresh: Vec<&Shape> = live
            .iter()
            .copied()
            .filter(|s| !self.bridges.contains_key(&s.id))
            .collect();

        let mut mounted = Vec::with_capacity(fresh.len());
        for shape in fresh {
            match self.notes.render::<R>(shape, &mut self.bus) {
                Ok(bridge) => mounted.push(bridge),
                Err(e) => warn!(shape = %shape.id, error = %e, "note editor failed to mount"),
            }
        }
        for id in gone {
            if let Some(bridge) = self.bridges.remove(&id) {
                bridge.unmount(&mut self.bus);
            }
        }
        for bridge in self.bridges.values_mut() {
            if let Ok(true) = bridge.refresh(&self.doc) {
                debug!(shape = %bridge.shape_id(), "note editor re-seeded from store");
            }
        }
        for bridge in mounted {
            self.bridges.insert(bridge.shape_id(), bridge);
        }
        debug!(%page, mounted = self.bridges.len(), "render pass");
    }

    // --- Notes ---

    /// Create a default note centered on the viewport and select it
    pub fn create_note(&mut self) -> Result<ShapeId> {
        let shape = self
            .notes
            .create_at(self.doc.current_page(), self.doc.viewport_center());
        let id = self.doc.transact(|tx| tx.create_shape(shape))?;
        self.doc.select(&[id]);
        self.sync_mounts();
        Ok(id)
    }

    /// Publish a command and let the addressed editor apply it
    pub fn dispatch(&mut self, command: NoteCommand) -> Result<Delivery> {
        let target = command.id;
        let delivery = self.bus.publish(command);
        if delivery == Delivery::Delivered
            && let Some(bridge) = self.bridges.get_mut(&target)
        {
            bridge.pump(&mut self.doc)?;
        }
        Ok(delivery)
    }

    /// Toolbar entry point: format the selected note, if exactly one note is
    /// selected
    pub fn format_selected_note(&mut self, action: NoteAction, value: Option<&str>) -> Result<Delivery> {
        if !self.toolbar().is_single_note {
            return Ok(Delivery::Dropped);
        }
        let Some(&id) = self.doc.selected_ids().first() else {
            return Ok(Delivery::Dropped);
        };
        let command = NoteCommand {
            id,
            action,
            value: value.map(str::to_string),
        };
        self.dispatch(command)
    }

    /// Local typing inside a mounted note
    pub fn edit_note(&mut self, id: ShapeId, f: impl FnOnce(&mut R)) -> Result<()> {
        let bridge = self
            .bridges
            .get_mut(&id)
            .ok_or_else(|| BoardError::not_found("mounted note", id))?;
        bridge.edit(&mut self.doc, f)
    }

    /// Route a pointer event that landed on a note
    pub fn pointer(&self, id: ShapeId, event: PointerEvent) -> Propagation {
        self.bridges
            .get(&id)
            .map(|b| b.intercept(&event))
            .unwrap_or(Propagation::Continue)
    }

    /// Resize a note from `initial` by the drag's scale factors
    pub fn resize_note(&mut self, id: ShapeId, initial: &NoteProps, scale_x: f64, scale_y: f64) -> Result<()> {
        let size = self.notes.on_resize(initial, scale_x, scale_y);
        self.doc.transact(|tx| {
            tx.update_shape(id, |shape| {
                if let Some(note) = shape.as_note_mut() {
                    note.w = size.w;
                    note.h = size.h;
                }
            })
        })
    }

    // --- Selection and shapes ---

    pub fn add_shape(&mut self, x: f64, y: f64, kind: ShapeKind) -> Result<ShapeId> {
        let shape = Shape::new(self.doc.current_page(), x, y, kind);
        let id = self.doc.transact(|tx| tx.create_shape(shape))?;
        self.sync_mounts();
        Ok(id)
    }

    pub fn move_shape(&mut self, id: ShapeId, x: f64, y: f64) -> Result<()> {
        self.doc.transact(|tx| {
            tx.update_shape(id, |shape| {
                shape.x = x;
                shape.y = y;
            })
        })
    }

    pub fn select(&mut self, ids: &[ShapeId]) {
        self.doc.select(ids);
    }

    pub fn select_all(&mut self) {
        self.doc.select_all();
    }

    pub fn select_none(&mut self) {
        self.doc.select_none();
    }

    pub fn delete_selection(&mut self) -> Result<usize> {
        let ids = self.doc.selected_ids().to_vec();
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.doc.transact(|tx| Ok(tx.delete_shapes(&ids)))?;
        self.sync_mounts();
        Ok(removed)
    }

    /// Delete every shape on the current page
    pub fn clear_page(&mut self) -> Result<usize> {
        let ids: Vec<ShapeId> = self.doc.current_page_shapes().map(|s| s.id).collect();
        let removed = self.doc.transact(|tx| Ok(tx.delete_shapes(&ids)))?;
        self.sync_mounts();
        Ok(removed)
    }

    /// Copy the selection with an offset and select the copies
    pub fn duplicate_selection(&mut self) -> Result<Vec<ShapeId>> {
        let copies: Vec<Shape> = self
            .doc
            .selected_shapes()
            .into_iter()
            .map(|s| s.duplicated(DUPLICATE_OFFSET, DUPLICATE_OFFSET))
            .collect();
        if copies.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self.doc.transact(|tx| {
            copies
                .into_iter()
                .map(|s| tx.create_shape(s))
                .collect::<Result<Vec<_>>>()
        })?;
        self.doc.select(&ids);
        self.sync_mounts();
        Ok(ids)
    }

    pub fn rotate_selection(&mut self, degrees: f64) -> Result<()> {
        let ids = self.doc.selected_ids().to_vec();
        if ids.is_empty() {
            return Ok(());
        }
        let radians = degrees.to_radians();
        self.doc.transact(|tx| {
            for id in &ids {
                tx.update_shape(*id, |shape| shape.rotation += radians)?;
            }
            Ok(())
        })
    }

    pub fn bring_selection_to_front(&mut self) -> Result<()> {
        let ids = self.doc.selected_ids().to_vec();
        if ids.is_empty() {
            return Ok(());
        }
        self.doc.transact(|tx| {
            tx.bring_to_front(&ids);
            Ok(())
        })
    }

    /// Create an asset and an image shape centered on the viewport
    pub fn place_image(&mut self, asset: Asset) -> Result<ShapeId> {
        let center = self.doc.viewport_center();
        let page = self.doc.current_page();
        let (w, h) = (f64::from(asset.w), f64::from(asset.h));
        let id = self.doc.transact(|tx| {
            let asset_id = tx.create_asset(asset);
            tx.create_shape(Shape::new(
                page,
                center.x - w / 2.0,
                center.y - h / 2.0,
                ShapeKind::Image { asset_id, w, h },
            ))
        })?;
        self.sync_mounts();
        Ok(id)
    }

    pub fn set_viewport_center(&mut self, center: Point) {
        self.doc.set_viewport_center(center);
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.doc.undo();
        self.sync_mounts();
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.doc.redo();
        self.sync_mounts();
        redone
    }

    /// Replace the whole canvas state
    pub fn load_snapshot(&mut self, snapshot: CanvasSnapshot) -> Result<()> {
        self.doc.load_snapshot(snapshot)?;
        self.sync_mounts();
        Ok(())
    }

    // --- Pages ---

    pub fn create_page(&mut self, name: &str) -> Result<PageId> {
        let id = self.pages.create_page(&mut self.doc, name)?;
        self.sync_mounts();
        Ok(id)
    }

    pub fn delete_page(&mut self, id: PageId) -> Result<()> {
        self.pages.delete_page(&mut self.doc, id)?;
        self.sync_mounts();
        Ok(())
    }

    pub fn switch_page(&mut self, id: PageId) -> Result<()> {
        self.pages.switch_page(&mut self.doc, id)?;
        self.sync_mounts();
        Ok(())
    }

    pub fn begin_rename(&self, id: PageId) -> Result<RenameBuffer> {
        self.pages.begin_rename(&self.doc, id)
    }

    pub fn confirm_rename(&mut self, buffer: RenameBuffer) -> Result<bool> {
        self.pages.confirm_rename(&mut self.doc, buffer)
    }

    pub fn cancel_rename(&self, buffer: RenameBuffer) {
        self.pages.cancel_rename(buffer);
    }

    // --- Preferences ---

    pub fn toggle_grid(&mut self) -> Result<bool> {
        self.doc.transact(|tx| {
            let mut on = false;
            tx.update_preferences(|p| {
                p.grid_mode = !p.grid_mode;
                on = p.grid_mode;
            });
            Ok(on)
        })
    }

    /// Returns whether motion is now reduced
    pub fn toggle_reduced_motion(&mut self) -> Result<bool> {
        self.doc.transact(|tx| {
            let mut reduced = false;
            tx.update_preferences(|p| {
                p.animation_speed = if p.animation_speed == 0.0 { 1.0 } else { 0.0 };
                reduced = p.animation_speed == 0.0;
            });
            Ok(reduced)
        })
    }

    pub fn set_color_scheme(&mut self, scheme: ColorScheme) -> Result<()> {
        self.doc.transact(|tx| {
            tx.update_preferences(|p| p.color_scheme = scheme);
            Ok(())
        })
    }
}
