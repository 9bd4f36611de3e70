//! Shape records held by the canvas store.
//!
//! `ShapeKind` carries the type tag and the type-specific props. Every
//! record belongs to exactly one page.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::note::NoteProps;

/// Type tag of the rich-text note card.
pub const NOTE_TYPE: &str = "jiuk-note";

/// Shape identifier - UUID for global uniqueness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub Uuid);

impl ShapeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape:{}", self.0)
    }
}

impl std::str::FromStr for ShapeId {
    type Err = crate::error::BoardError;

    /// Accepts both `shape:<uuid>` and a bare uuid
    fn from_str(s: &str) -> crate::error::Result<Self> {
        let raw = s.trim();
        let raw = raw.strip_prefix("shape:").unwrap_or(raw);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| crate::error::BoardError::validation(format!("bad shape id {s:?}: {e}")))
    }
}

/// Page identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page:{}", self.0)
    }
}

/// Asset identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub Uuid);

impl AssetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset:{}", self.0)
    }
}

/// A point in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle used for hit-testing, selection and indicators.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub filled: bool,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            filled: false,
        }
    }

    pub fn filled(mut self) -> Self {
        self.filled = true;
        self
    }

    /// Whether a point falls inside. Outline-only rects still contain their
    /// interior for bounds purposes.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.w && p.y >= self.y && p.y <= self.y + self.h
    }

    fn around(points: impl IntoIterator<Item = Point>) -> Self {
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        let mut any = false;
        for p in points {
            any = true;
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if !any {
            return Self::default();
        }
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Type-specific props, internally tagged with the shape's type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ShapeKind {
    /// Rich-text note card
    #[serde(rename = "jiuk-note")]
    Note(NoteProps),
    /// Rectangle, ellipse, star and friends
    Geo {
        geo: String,
        w: f64,
        h: f64,
        #[serde(default)]
        label: String,
    },
    /// Freehand stroke, points relative to the shape origin
    Draw { points: Vec<Point> },
    Line { start: Point, end: Point },
    Arrow { start: Point, end: Point },
    Text { text: String },
    /// The engine's built-in sticky note (not the rich-text card)
    #[serde(rename = "note")]
    Sticky { text: String },
    Image { asset_id: AssetId, w: f64, h: f64 },
}

impl ShapeKind {
    /// The type tag the toolbar keys its sections on
    pub fn type_tag(&self) -> &'static str {
        match self {
            ShapeKind::Note(_) => NOTE_TYPE,
            ShapeKind::Geo { .. } => "geo",
            ShapeKind::Draw { .. } => "draw",
            ShapeKind::Line { .. } => "line",
            ShapeKind::Arrow { .. } => "arrow",
            ShapeKind::Text { .. } => "text",
            ShapeKind::Sticky { .. } => "note",
            ShapeKind::Image { .. } => "image",
        }
    }
}

/// A positioned shape record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub page: PageId,
    pub x: f64,
    pub y: f64,
    /// Radians
    #[serde(default)]
    pub rotation: f64,
    pub props: ShapeKind,
}

impl Shape {
    pub fn new(page: PageId, x: f64, y: f64, props: ShapeKind) -> Self {
        Self {
            id: ShapeId::new(),
            page,
            x,
            y,
            rotation: 0.0,
            props,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        self.props.type_tag()
    }

    pub fn is_note(&self) -> bool {
        matches!(self.props, ShapeKind::Note(_))
    }

    pub fn as_note(&self) -> Option<&NoteProps> {
        match &self.props {
            ShapeKind::Note(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_note_mut(&mut self) -> Option<&mut NoteProps> {
        match &mut self.props {
            ShapeKind::Note(props) => Some(props),
            _ => None,
        }
    }

    /// Page-space bounds, ignoring rotation
    pub fn bounds(&self) -> Rect {
        let local = match &self.props {
            ShapeKind::Note(props) => Rect::new(0.0, 0.0, props.w, props.h),
            ShapeKind::Geo { w, h, .. } | ShapeKind::Image { w, h, .. } => {
                Rect::new(0.0, 0.0, *w, *h)
            }
            ShapeKind::Draw { points } => Rect::around(points.iter().copied()),
            ShapeKind::Line { start, end } | ShapeKind::Arrow { start, end } => {
                Rect::around([*start, *end])
            }
            // Text metrics belong to the renderer; the store only knows the origin
            ShapeKind::Text { .. } | ShapeKind::Sticky { .. } => Rect::default(),
        };
        Rect::new(self.x + local.x, self.y + local.y, local.w, local.h)
    }

    /// Copy with a fresh id, offset by (dx, dy)
    pub fn duplicated(&self, dx: f64, dy: f64) -> Self {
        Self {
            id: ShapeId::new(),
            x: self.x + dx,
            y: self.y + dy,
            ..self.clone()
        }
    }
}
