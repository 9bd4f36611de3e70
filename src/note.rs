//! The rich-text note card as a canvas shape type.
//!
//! `NoteShapeUtil` is what the canvas engine asks about a note: its default
//! props, its hit-test geometry, how it reacts to a resize drag, and what
//! to draw as the selection indicator. Rendering a note means mounting an
//! [`EditorBridge`](crate::bridge::EditorBridge) for it.

use serde::{Deserialize, Serialize};

use crate::bridge::EditorBridge;
use crate::bus::CommandBus;
use crate::error::{BoardError, Result};
use crate::markup::RichText;
use crate::shapes::{PageId, Point, Rect, Shape, ShapeKind, NOTE_TYPE};

/// Minimum note width in canvas units
pub const MIN_WIDTH: f64 = 200.0;
/// Minimum note height in canvas units
pub const MIN_HEIGHT: f64 = 150.0;

pub const DEFAULT_WIDTH: f64 = 350.0;
pub const DEFAULT_HEIGHT: f64 = 400.0;

/// Markup a freshly created note starts with
pub const SEED_CONTENT: &str = "<h2>Novo Card</h2><p>Digite aqui...</p>";

/// Header label drawn above the note content
pub const HEADER_LABEL: &str = "Jiukisidian Note";

/// Props stored on a note shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteProps {
    pub w: f64,
    pub h: f64,
    /// Serialized rich-text document
    pub content: String,
}

impl Default for NoteProps {
    fn default() -> Self {
        Self {
            w: DEFAULT_WIDTH,
            h: DEFAULT_HEIGHT,
            content: SEED_CONTENT.to_string(),
        }
    }
}

/// How a resize drag maps onto note dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizePolicy {
    /// Each axis scales on its own
    #[default]
    Independent,
    /// Both axes take the dominant factor
    PreserveAspect,
}

/// Result of a resize
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteSize {
    pub w: f64,
    pub h: f64,
}

/// Shape-type definition for notes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteShapeUtil {
    pub policy: ResizePolicy,
}

impl NoteShapeUtil {
    pub fn new(policy: ResizePolicy) -> Self {
        Self { policy }
    }

    pub fn type_name(&self) -> &'static str {
        NOTE_TYPE
    }

    pub fn can_resize(&self) -> bool {
        true
    }

    pub fn default_props(&self) -> NoteProps {
        NoteProps::default()
    }

    /// Filled rectangle in shape-local space
    pub fn geometry(&self, props: &NoteProps) -> Rect {
        Rect::new(0.0, 0.0, props.w, props.h).filled()
    }

    /// Outline drawn for the selection highlight
    pub fn indicator(&self, props: &NoteProps) -> Rect {
        Rect::new(0.0, 0.0, props.w, props.h)
    }

    /// New size given the size at drag start and the drag's scale factors.
    ///
    /// The minimums hold for any input, including zero, negative and
    /// non-finite scales (`f64::max` discards NaN).
    pub fn on_resize(&self, initial: &NoteProps, scale_x: f64, scale_y: f64) -> NoteSize {
        let (sx, sy) = match self.policy {
            ResizePolicy::Independent => (scale_x, scale_y),
            ResizePolicy::PreserveAspect => {
                let s = if scale_x.abs() >= scale_y.abs() {
                    scale_x
                } else {
                    scale_y
                };
                (s, s)
            }
        };
        NoteSize {
            w: MIN_WIDTH.max(initial.w * sx),
            h: MIN_HEIGHT.max(initial.h * sy),
        }
    }

    /// A default note centered on `center`
    pub fn create_at(&self, page: PageId, center: Point) -> Shape {
        let props = self.default_props();
        Shape::new(
            page,
            center.x - props.w / 2.0,
            center.y - props.h / 2.0,
            ShapeKind::Note(props),
        )
    }

    /// Mount the embedded editor for a note shape
    pub fn render<R: RichText>(&self, shape: &Shape, bus: &mut CommandBus) -> Result<EditorBridge<R>> {
        if !shape.is_note() {
            return Err(BoardError::validation(format!(
                "{} is a {} shape, not a note",
                shape.id,
                shape.type_tag()
            )));
        }
        Ok(EditorBridge::mount(shape, bus))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn props(w: f64, h: f64) -> NoteProps {
        NoteProps {
            w,
            h,
            content: String::new(),
        }
    }

    #[test]
    fn defaults() {
        let util = NoteShapeUtil::default();
        let p = util.default_props();
        assert_eq!((p.w, p.h), (350.0, 400.0));
        assert_eq!(p.content, SEED_CONTENT);
        assert!(util.can_resize());
    }

    #[test]
    fn geometry_is_filled_indicator_is_not() {
        let util = NoteShapeUtil::default();
        let p = props(300.0, 250.0);
        let g = util.geometry(&p);
        assert!(g.filled);
        assert_eq!((g.w, g.h), (300.0, 250.0));
        assert!(!util.indicator(&p).filled);
    }

    #[test]
    fn independent_axes() {
        let util = NoteShapeUtil::default();
        let size = util.on_resize(&props(350.0, 400.0), 2.0, 0.5);
        assert_eq!(size, NoteSize { w: 700.0, h: 200.0 });
    }

    #[test]
    fn clamps_to_minimums() {
        let util = NoteShapeUtil::default();
        let size = util.on_resize(&props(350.0, 400.0), 0.1, 0.1);
        assert_eq!(size, NoteSize { w: 200.0, h: 150.0 });
        let size = util.on_resize(&props(350.0, 400.0), f64::NAN, -3.0);
        assert_eq!(size, NoteSize { w: 200.0, h: 150.0 });
    }

    #[test]
    fn preserve_aspect_uses_dominant_factor() {
        let util = NoteShapeUtil::new(ResizePolicy::PreserveAspect);
        let size = util.on_resize(&props(400.0, 400.0), 1.5, 1.1);
        assert_eq!(size, NoteSize { w: 600.0, h: 600.0 });
    }

    #[test]
    fn create_at_centers_default_note() {
        let util = NoteShapeUtil::default();
        let shape = util.create_at(PageId::new(), Point::new(500.0, 500.0));
        assert_eq!((shape.x, shape.y), (325.0, 300.0));
        assert!(shape.is_note());
    }

    proptest! {
        #[test]
        fn resize_never_goes_below_minimum(
            w in 0.0f64..5000.0,
            h in 0.0f64..5000.0,
            sx in prop::num::f64::ANY,
            sy in prop::num::f64::ANY,
            aspect in any::<bool>(),
        ) {
            let policy = if aspect { ResizePolicy::PreserveAspect } else { ResizePolicy::Independent };
            let size = NoteShapeUtil::new(policy).on_resize(&props(w, h), sx, sy);
            prop_assert!(size.w >= MIN_WIDTH);
            prop_assert!(size.h >= MIN_HEIGHT);
        }
    }
}
