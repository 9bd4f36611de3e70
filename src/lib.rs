//! jiukisidian: an infinite-canvas board of rich-text note cards.
//!
//! The [`Board`] is the application root. It owns the canvas [`Document`],
//! the [`CommandBus`] that carries toolbar commands to individual notes, and
//! one [`EditorBridge`] per note mounted on the current page. A [`Session`]
//! pairs a board with project storage.

pub mod assets;
pub mod board;
pub mod bridge;
pub mod bus;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod file_io;
pub mod markup;
pub mod note;
pub mod pages;
pub mod projects;
pub mod recovery;
pub mod selection;
pub mod session;
pub mod shapes;
pub mod storage;
pub mod undo;

pub use board::{Board, BoardOptions};
pub use bridge::EditorBridge;
pub use bus::{CommandBus, Delivery, NoteAction, NoteCommand};
pub use document::{CanvasSnapshot, Document};
pub use error::{BoardError, Result};
pub use markup::{FormatCommand, MarkupDocument, RichText};
pub use session::Session;
pub use shapes::{PageId, Shape, ShapeId, ShapeKind};
