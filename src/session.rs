//! A running session: storage, the project registry and the one live board.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::board::{Board, BoardOptions};
use crate::document::{CanvasSnapshot, Document};
use crate::error::{BoardError, Result};
use crate::file_io::{self, ProjectFileMeta};
use crate::projects::{ProjectId, ProjectRecord, ProjectRegistry};
use crate::storage::KeyValueStorage;

pub struct Session<S: KeyValueStorage> {
    storage: S,
    registry: ProjectRegistry,
    board: Board,
    options: BoardOptions,
}

impl<S: KeyValueStorage> Session<S> {
    /// Load the registry and mount the active project
    pub fn open(mut storage: S, options: BoardOptions) -> Result<Self> {
        let registry = ProjectRegistry::load(&mut storage)?;
        let active = registry.active_id();
        let snapshot = registry.load_snapshot(&storage, active)?;
        let board = Board::new(document_for(snapshot, options)?, options);
        info!(project = %active, "session opened");
        Ok(Self {
            storage,
            registry,
            board,
            options,
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn active_project(&self) -> &ProjectRecord {
        self.registry.active()
    }

    pub fn list_projects(&self) -> &[ProjectRecord] {
        self.registry.list()
    }

    /// Persist the live board under the active project
    pub fn save(&mut self) -> Result<()> {
        let id = self.registry.active_id();
        self.registry
            .save_snapshot(&mut self.storage, id, &self.board.snapshot())?;
        self.board.mark_clean();
        Ok(())
    }

    /// Save only when there are unsaved changes. Returns whether it saved.
    pub fn autosave(&mut self) -> Result<bool> {
        if !self.board.is_dirty() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Create a project and switch to its empty canvas
    pub fn create_project(&mut self, name: &str) -> Result<ProjectId> {
        self.save()?;
        let id = self.registry.create(&mut self.storage, name)?;
        self.board.remount(document_for(None, self.options)?);
        Ok(id)
    }

    /// Delete a project. Deleting the active one mounts the new first project.
    ///
    /// The surviving project's snapshot is read before the registry changes,
    /// so an unreadable snapshot aborts the delete with nothing touched.
    pub fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        let successor = if id == self.registry.active_id() {
            let next = self
                .registry
                .list()
                .iter()
                .find(|r| r.id != id)
                .map(|r| r.id)
                .ok_or_else(|| BoardError::validation("you need to keep at least one project"))?;
            let snapshot = self.registry.load_snapshot(&self.storage, next)?;
            Some((next, document_for(snapshot, self.options)?))
        } else {
            None
        };

        self.registry.delete(&mut self.storage, id)?;
        if let Some((next, doc)) = successor {
            self.board.remount(doc);
            info!(project = %next, "switched after delete");
        }
        Ok(())
    }

    /// Persist the current project, tear its board down and mount `id`.
    ///
    /// The target snapshot is read before anything is torn down, so a
    /// failed switch leaves the current project mounted.
    pub fn switch_project(&mut self, id: ProjectId) -> Result<()> {
        if self.registry.get(id).is_none() {
            return Err(BoardError::not_found("project", id));
        }
        if id == self.registry.active_id() {
            return Ok(());
        }
        self.save()?;
        let doc = document_for(self.registry.load_snapshot(&self.storage, id)?, self.options)?;
        self.registry.set_active(&mut self.storage, id)?;
        self.board.remount(doc);
        info!(project = %id, "project switched");
        Ok(())
    }

    /// Export the live board as a project file into `dir`
    pub async fn save_project_to_file(&self, dir: &Path) -> Result<PathBuf> {
        file_io::save_project_to_file(self.board.doc(), &self.active_project().name, dir).await
    }

    /// Replace the live board's state with a project file's snapshot. A bad
    /// file leaves the board untouched.
    pub async fn load_project_from_file(&mut self, path: &Path) -> Result<ProjectFileMeta> {
        let file = file_io::read_project_file(path).await?;
        self.board.load_snapshot(file.data)?;
        info!(path = %path.display(), name = %file.meta.name, "project loaded from file");
        Ok(file.meta)
    }

    /// Wipe every stored key and start over with the default project
    pub fn hard_reset(&mut self) -> Result<()> {
        self.storage.clear()?;
        self.registry = ProjectRegistry::load(&mut self.storage)?;
        self.board.remount(document_for(None, self.options)?);
        info!("storage cleared");
        Ok(())
    }
}

fn document_for(snapshot: Option<CanvasSnapshot>, options: BoardOptions) -> Result<Document> {
    let mut doc = Document::with_history(options.undo_history);
    if let Some(snapshot) = snapshot {
        doc.load_snapshot(snapshot)?;
        doc.mark_clean();
    }
    Ok(doc)
}
