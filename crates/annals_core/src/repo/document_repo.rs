//! JSON document repository.
//!
//! # Responsibility
//! - Read the entity and event documents into a `Dataset`.
//! - Write them back as pretty UTF-8 JSON through temp-file + rename.
//! - Read batch documents and write removal backups.
//!
//! # Invariants
//! - Output uses 2-space indentation, unescaped non-ASCII and a trailing
//!   newline.
//! - A crash mid-save leaves the previous document intact.

use crate::model::entity::Entity;
use crate::model::event::Event;
use crate::normalize::name_key::Normalizer;
use crate::service::reconcile_service::BatchRecord;
use crate::store::entity_store::StoreError;
use crate::store::Dataset;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::{Path, PathBuf};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse {
        path: String,
        source: serde_json::Error,
    },
    Serialize(serde_json::Error),
    /// Another run holds the writer lock.
    Locked(PathBuf),
    /// Loaded documents break a store invariant.
    Store(StoreError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on `{path}`: {source}"),
            Self::Parse { path, source } => write!(f, "failed to parse `{path}`: {source}"),
            Self::Serialize(err) => write!(f, "failed to serialize document: {err}"),
            Self::Locked(path) => write!(
                f,
                "dataset is locked by another run (remove `{}` if stale)",
                path.display()
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::Locked(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Load/save contract for one dataset.
pub trait DatasetRepository {
    fn load_documents(&self) -> RepoResult<(Vec<Entity>, Vec<Event>)>;
    fn save(&self, dataset: &Dataset) -> RepoResult<()>;

    /// Loads both documents and builds the stores.
    fn load(&self, normalizer: Normalizer) -> RepoResult<Dataset> {
        let (entities, events) = self.load_documents()?;
        Ok(Dataset::from_records(normalizer, entities, events)?)
    }
}

/// Two JSON array documents on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonDocumentRepository {
    entities_path: PathBuf,
    events_path: PathBuf,
}

impl JsonDocumentRepository {
    pub fn new(entities_path: impl Into<PathBuf>, events_path: impl Into<PathBuf>) -> Self {
        Self {
            entities_path: entities_path.into(),
            events_path: events_path.into(),
        }
    }

    pub fn entities_path(&self) -> &Path {
        &self.entities_path
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }
}

impl DatasetRepository for JsonDocumentRepository {
    fn load_documents(&self) -> RepoResult<(Vec<Entity>, Vec<Event>)> {
        let entities: Vec<Entity> = read_document(&self.entities_path)?;
        let events: Vec<Event> = read_document(&self.events_path)?;
        info!(
            "event=dataset_load module=repo status=ok entities={} events={}",
            entities.len(),
            events.len()
        );
        Ok((entities, events))
    }

    fn save(&self, dataset: &Dataset) -> RepoResult<()> {
        write_document(&self.entities_path, dataset.entities.all())?;
        write_document(&self.events_path, dataset.events.all())?;
        info!(
            "event=dataset_save module=repo status=ok entities={} events={}",
            dataset.entities.len(),
            dataset.events.len()
        );
        Ok(())
    }
}

/// Reads a batch document (JSON array of records).
pub fn load_batch(path: &Path) -> RepoResult<Vec<BatchRecord>> {
    read_document(path)
}

/// Writes removed records as their own document.
pub fn write_backup(path: &Path, removed: &[Entity]) -> RepoResult<()> {
    write_document(path, removed)?;
    info!(
        "event=backup_write module=repo status=ok records={} path={}",
        removed.len(),
        path.display()
    );
    Ok(())
}

pub fn read_document<T: DeserializeOwned>(path: &Path) -> RepoResult<T> {
    let content = std::fs::read_to_string(path).map_err(|source| RepoError::Io {
        path: path.display().to_string(),
        source,
    })?;
    // Tolerate a UTF-8 BOM left by editors.
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    serde_json::from_str(content).map_err(|source| RepoError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Serializes `value` and atomically replaces `path`.
pub fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> RepoResult<()> {
    let mut rendered = serde_json::to_string_pretty(value).map_err(RepoError::Serialize)?;
    rendered.push('\n');

    let io_error = |source: std::io::Error| RepoError::Io {
        path: path.display().to_string(),
        source,
    };
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(directory).map_err(io_error)?;
    temp.write_all(rendered.as_bytes()).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read_document, write_document, RepoError};
    use serde_json::{json, Value};

    #[test]
    fn write_is_pretty_utf8_with_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_document(&path, &json!([{"name": "Trương Định"}])).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "[\n  {\n    \"name\": \"Trương Định\"\n  }\n]\n");
    }

    #[test]
    fn read_reports_path_on_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[{").unwrap();
        let err = read_document::<Value>(&path).unwrap_err();
        match err {
            RepoError::Parse { path: reported, .. } => assert!(reported.ends_with("broken.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn read_skips_byte_order_mark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.json");
        std::fs::write(&path, "\u{feff}[]").unwrap();
        let value: Vec<Value> = read_document(&path).unwrap();
        assert!(value.is_empty());
    }
}
