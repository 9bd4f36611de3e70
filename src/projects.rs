//! Project registry and per-project snapshot storage.
//!
//! The index lives under one storage key as a JSON array of
//! `{id, name, lastModified}`; each project's canvas snapshot lives under
//! its own key derived from the project id. The index is never empty.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::CanvasSnapshot;
use crate::error::{BoardError, Result};
use crate::storage::KeyValueStorage;

pub const INDEX_KEY: &str = "jiukisidian-projects-index";
pub const ACTIVE_KEY: &str = "jiukisidian-active-project";
pub const DATA_KEY_PREFIX: &str = "jiukisidian-data-";

/// Name given to the project created on first launch
pub const DEFAULT_PROJECT_NAME: &str = "Meu Primeiro Projeto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProjectId {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| BoardError::validation(format!("bad project id {s:?}: {e}")))
    }
}

/// Storage key of a project's snapshot
pub fn snapshot_key(id: ProjectId) -> String {
    format!("{DATA_KEY_PREFIX}{id}")
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    /// Milliseconds since the Unix epoch
    pub last_modified: i64,
}

impl ProjectRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            last_modified: now_millis(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    records: Vec<ProjectRecord>,
    active: ProjectId,
}

impl ProjectRegistry {
    /// Read the index, creating the default project on first launch.
    ///
    /// An index that does not parse is a format error; the caller decides
    /// whether to hard-reset.
    pub fn load(storage: &mut dyn KeyValueStorage) -> Result<Self> {
        let mut records: Vec<ProjectRecord> = match storage.get(INDEX_KEY)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| BoardError::format(format!("project index: {e}")))?,
            None => Vec::new(),
        };
        if records.is_empty() {
            let record = ProjectRecord::new(DEFAULT_PROJECT_NAME);
            info!(id = %record.id, "creating default project");
            records.push(record);
        }

        let stored_active = storage
            .get(ACTIVE_KEY)?
            .and_then(|s| s.parse::<ProjectId>().ok())
            .filter(|id| records.iter().any(|r| r.id == *id));
        let active = stored_active.unwrap_or(records[0].id);

        let registry = Self { records, active };
        registry.persist_index(storage)?;
        registry.persist_active(storage)?;
        Ok(registry)
    }

    /// Records in creation order
    pub fn list(&self) -> &[ProjectRecord] {
        &self.records
    }

    pub fn get(&self, id: ProjectId) -> Option<&ProjectRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn active_id(&self) -> ProjectId {
        self.active
    }

    pub fn active(&self) -> &ProjectRecord {
        // `active` always names a record in the index
        self.get(self.active).unwrap_or(&self.records[0])
    }

    /// Append a project and make it active
    pub fn create(&mut self, storage: &mut dyn KeyValueStorage, name: &str) -> Result<ProjectId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::validation("project name cannot be empty"));
        }
        let record = ProjectRecord::new(name);
        let id = record.id;
        self.records.push(record);
        self.persist_index(storage)?;
        self.set_active(storage, id)?;
        info!(%id, name, "project created");
        Ok(id)
    }

    /// Remove a project and its snapshot. Returns the new active id when the
    /// deleted project was active.
    pub fn delete(&mut self, storage: &mut dyn KeyValueStorage, id: ProjectId) -> Result<Option<ProjectId>> {
        if self.get(id).is_none() {
            return Err(BoardError::not_found("project", id));
        }
        if self.records.len() <= 1 {
            return Err(BoardError::validation("you need to keep at least one project"));
        }
        self.records.retain(|r| r.id != id);
        self.persist_index(storage)?;
        storage.remove(&snapshot_key(id))?;
        info!(%id, "project deleted");

        if self.active == id {
            let next = self.records[0].id;
            self.set_active(storage, next)?;
            return Ok(Some(next));
        }
        Ok(None)
    }

    pub fn set_active(&mut self, storage: &mut dyn KeyValueStorage, id: ProjectId) -> Result<()> {
        if self.get(id).is_none() {
            return Err(BoardError::not_found("project", id));
        }
        self.active = id;
        self.persist_active(storage)
    }

    /// Bump `lastModified` to now
    pub fn touch(&mut self, storage: &mut dyn KeyValueStorage, id: ProjectId) -> Result<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BoardError::not_found("project", id))?;
        record.last_modified = now_millis();
        self.persist_index(storage)
    }

    pub fn load_snapshot(&self, storage: &dyn KeyValueStorage, id: ProjectId) -> Result<Option<CanvasSnapshot>> {
        let Some(json) = storage.get(&snapshot_key(id))? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(%id, error = %e, "stored snapshot does not decode");
                Err(BoardError::format(format!("snapshot for project {id}: {e}")))
            }
        }
    }

    pub fn save_snapshot(
        &mut self,
        storage: &mut dyn KeyValueStorage,
        id: ProjectId,
        snapshot: &CanvasSnapshot,
    ) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        storage.set(&snapshot_key(id), &json)?;
        self.touch(storage, id)
    }

    fn persist_index(&self, storage: &mut dyn KeyValueStorage) -> Result<()> {
        let json = serde_json::to_string(&self.records)?;
        storage.set(INDEX_KEY, &json)
    }

    fn persist_active(&self, storage: &mut dyn KeyValueStorage) -> Result<()> {
        storage.set(ACTIVE_KEY, &self.active.to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn first_launch_creates_default_project() {
        let mut storage = MemoryStorage::new();
        let registry = ProjectRegistry::load(&mut storage).unwrap();
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.active().name, DEFAULT_PROJECT_NAME);
        assert!(storage.get(INDEX_KEY).unwrap().is_some());
    }

    #[test]
    fn index_uses_camel_case_fields() {
        let mut storage = MemoryStorage::new();
        ProjectRegistry::load(&mut storage).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&storage.get(INDEX_KEY).unwrap().unwrap()).unwrap();
        assert!(json[0]["lastModified"].is_i64());
        assert!(json[0]["id"].is_string());
    }

    #[test]
    fn create_appends_and_activates() {
        let mut storage = MemoryStorage::new();
        let mut registry = ProjectRegistry::load(&mut storage).unwrap();
        let id = registry.create(&mut storage, "Draft").unwrap();
        assert_eq!(registry.list().last().unwrap().name, "Draft");
        assert_eq!(registry.active_id(), id);

        let reloaded = ProjectRegistry::load(&mut storage).unwrap();
        assert_eq!(reloaded.list(), registry.list());
        assert_eq!(reloaded.active_id(), id);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut storage = MemoryStorage::new();
        let mut registry = ProjectRegistry::load(&mut storage).unwrap();
        assert!(registry.create(&mut storage, "  ").unwrap_err().is_validation());
    }

    #[test]
    fn last_project_cannot_be_deleted() {
        let mut storage = MemoryStorage::new();
        let mut registry = ProjectRegistry::load(&mut storage).unwrap();
        let before = storage.get(INDEX_KEY).unwrap();
        let only = registry.active_id();
        assert!(registry.delete(&mut storage, only).unwrap_err().is_validation());
        assert_eq!(registry.list().len(), 1);
        assert_eq!(storage.get(INDEX_KEY).unwrap(), before);
    }

    #[test]
    fn deleting_active_moves_to_first_remaining() {
        let mut storage = MemoryStorage::new();
        let mut registry = ProjectRegistry::load(&mut storage).unwrap();
        let first = registry.active_id();
        let draft = registry.create(&mut storage, "Draft").unwrap();
        registry
            .save_snapshot(&mut storage, draft, &CanvasSnapshot::default())
            .unwrap();

        let next = registry.delete(&mut storage, draft).unwrap();
        assert_eq!(next, Some(first));
        assert_eq!(registry.active_id(), first);
        assert_eq!(storage.get(&snapshot_key(draft)).unwrap(), None);
    }

    #[test]
    fn deleting_inactive_keeps_active() {
        let mut storage = MemoryStorage::new();
        let mut registry = ProjectRegistry::load(&mut storage).unwrap();
        let first = registry.active_id();
        let second = registry.create(&mut storage, "Second").unwrap();
        registry.set_active(&mut storage, second).unwrap();
        assert_eq!(registry.delete(&mut storage, first).unwrap(), None);
        assert_eq!(registry.active_id(), second);
    }

    #[test]
    fn corrupt_index_is_format_error() {
        let mut storage = MemoryStorage::new();
        storage.set(INDEX_KEY, "{not json").unwrap();
        assert!(matches!(ProjectRegistry::load(&mut storage), Err(BoardError::Format(_))));
    }
}
