//! Page management over the canvas store.
//!
//! Renames go through a [`RenameBuffer`]: the text field edits the buffer,
//! and only `confirm` touches the store.

use tracing::info;

use crate::document::{Document, Page};
use crate::error::{BoardError, Result};
use crate::shapes::PageId;

/// Default page cap
pub const MAX_PAGES: usize = 20;

/// In-progress rename of one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameBuffer {
    page: PageId,
    text: String,
}

impl RenameBuffer {
    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageController {
    max_pages: usize,
}

impl Default for PageController {
    fn default() -> Self {
        Self::new(MAX_PAGES)
    }
}

impl PageController {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
        }
    }

    pub fn list<'a>(&self, doc: &'a Document) -> &'a [Page] {
        doc.pages()
    }

    /// Add a page and make it current
    pub fn create_page(&self, doc: &mut Document, name: &str) -> Result<PageId> {
        if doc.pages().len() >= self.max_pages {
            return Err(BoardError::validation(format!(
                "a project can hold at most {} pages",
                self.max_pages
            )));
        }
        let name = match name.trim() {
            "" => format!("Page {}", doc.pages().len() + 1),
            trimmed => trimmed.to_string(),
        };
        let id = doc.transact(|tx| {
            let id = tx.create_page(name.clone());
            tx.set_current_page(id)?;
            Ok(id)
        })?;
        doc.select_none();
        info!(%id, %name, "page created");
        Ok(id)
    }

    /// Open a rename buffer seeded with the page's current name
    pub fn begin_rename(&self, doc: &Document, id: PageId) -> Result<RenameBuffer> {
        let page = doc
            .snapshot()
            .page(id)
            .ok_or_else(|| BoardError::not_found("page", id))?;
        Ok(RenameBuffer {
            page: id,
            text: page.name.clone(),
        })
    }

    /// Commit the buffer. A blank buffer or an unchanged name commits
    /// nothing. Returns whether the store changed.
    pub fn confirm_rename(&self, doc: &mut Document, buffer: RenameBuffer) -> Result<bool> {
        let name = buffer.text.trim();
        if name.is_empty() {
            return Ok(false);
        }
        let current = doc
            .snapshot()
            .page(buffer.page)
            .ok_or_else(|| BoardError::not_found("page", buffer.page))?;
        if current.name == name {
            return Ok(false);
        }
        doc.transact(|tx| tx.rename_page(buffer.page, name))?;
        Ok(true)
    }

    /// Discard the buffer
    pub fn cancel_rename(&self, buffer: RenameBuffer) {
        drop(buffer);
    }

    pub fn delete_page(&self, doc: &mut Document, id: PageId) -> Result<()> {
        doc.transact(|tx| tx.delete_page(id))?;
        info!(%id, "page deleted");
        Ok(())
    }

    pub fn switch_page(&self, doc: &mut Document, id: PageId) -> Result<()> {
        doc.transact(|tx| tx.set_current_page(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_page(doc: &Document) -> PageId {
        doc.pages()[0].id
    }

    #[test]
    fn create_switches_to_new_page() {
        let mut doc = Document::new();
        let pages = PageController::default();
        let id = pages.create_page(&mut doc, "Ideas").unwrap();
        assert_eq!(doc.current_page(), id);
        assert_eq!(doc.pages().len(), 2);
        assert_eq!(doc.pages()[1].name, "Ideas");
    }

    #[test]
    fn page_cap_is_enforced() {
        let mut doc = Document::new();
        let pages = PageController::new(2);
        pages.create_page(&mut doc, "two").unwrap();
        assert!(pages.create_page(&mut doc, "three").unwrap_err().is_validation());
    }

    #[test]
    fn cancel_keeps_original_name() {
        let mut doc = Document::new();
        let pages = PageController::default();
        let mut buffer = pages.begin_rename(&doc, first_page(&doc)).unwrap();
        buffer.set_text("Renamed");
        pages.cancel_rename(buffer);
        assert_eq!(doc.pages()[0].name, "Page 1");
        assert!(!doc.is_dirty());
    }

    #[test]
    fn empty_confirm_is_noop() {
        let mut doc = Document::new();
        let pages = PageController::default();
        let mut buffer = pages.begin_rename(&doc, first_page(&doc)).unwrap();
        buffer.set_text("   ");
        assert!(!pages.confirm_rename(&mut doc, buffer).unwrap());
        assert_eq!(doc.pages()[0].name, "Page 1");
    }

    #[test]
    fn confirm_commits() {
        let mut doc = Document::new();
        let pages = PageController::default();
        let mut buffer = pages.begin_rename(&doc, first_page(&doc)).unwrap();
        buffer.set_text("Plan");
        assert!(pages.confirm_rename(&mut doc, buffer).unwrap());
        assert_eq!(doc.pages()[0].name, "Plan");
    }

    #[test]
    fn cannot_delete_only_page() {
        let mut doc = Document::new();
        let pages = PageController::default();
        let page = first_page(&doc);
        let err = pages.delete_page(&mut doc, page).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn deleting_current_page_falls_back_to_first() {
        let mut doc = Document::new();
        let pages = PageController::default();
        let second = pages.create_page(&mut doc, "B").unwrap();
        pages.delete_page(&mut doc, second).unwrap();
        assert_eq!(doc.current_page(), first_page(&doc));
    }

    #[test]
    fn switch_to_unknown_page_fails() {
        let mut doc = Document::new();
        let pages = PageController::default();
        assert!(pages.switch_page(&mut doc, PageId::new()).is_err());
    }
}
