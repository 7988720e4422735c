//! Flat-file document store: one pretty-printed JSON file per document under a
//! root directory, fronted by an in-memory map that is authoritative after load.
//!
//! Writers hold the cache write lock across the disk write, so add/update/delete
//! are serialized against each other and against readers. Concurrent writers from
//! separate processes are not coordinated.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use autouw_core::domain::document::{applicable_states_from, DocType, Document, ALL_STATES};
use autouw_core::errors::{ApplicationError, ValidationError};
use autouw_core::guidelines::GuidelineSource;

const IMMUTABLE_FIELDS: [&str; 2] = ["doc_id", "last_updated"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("document `{0}` not found")]
    NotFound(String),
    #[error("document file `{path}` is corrupt: {message}")]
    Parse { path: PathBuf, message: String, raw: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(error) => Self::Validation(error),
            StoreError::NotFound(id) => Self::NotFound { resource: "document", id },
            StoreError::Parse { path, message, raw } => {
                let message = format!("document file `{}` is corrupt: {message}", path.display());
                Self::parse(message, raw)
            }
            StoreError::Io { context, source } => Self::io(context, source),
        }
    }
}

pub struct DocumentStore {
    root: PathBuf,
    documents: RwLock<BTreeMap<String, Document>>,
}

impl DocumentStore {
    /// Creates `root` if needed and loads every `*.json` file in it. Files that fail
    /// to parse are skipped with a warning.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|source| StoreError::Io {
            context: format!("could not create documents directory `{}`", root.display()),
            source,
        })?;

        let mut documents = BTreeMap::new();
        let mut skipped = 0usize;
        let mut entries = fs::read_dir(&root).await.map_err(|source| StoreError::Io {
            context: format!("could not list documents directory `{}`", root.display()),
            source,
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
            context: format!("could not list documents directory `{}`", root.display()),
            source,
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match read_document(&path).await {
                Ok(document) => {
                    documents.insert(document.doc_id.clone(), document);
                }
                Err(error) => {
                    skipped += 1;
                    warn!(
                        event_name = "documents.load.skipped",
                        path = %path.display(),
                        error = %error,
                        "skipping unreadable document file"
                    );
                }
            }
        }

        info!(
            event_name = "documents.load.completed",
            root = %root.display(),
            loaded = documents.len(),
            skipped,
            "document store loaded"
        );

        Ok(Self { root, documents: RwLock::new(documents) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Inserts or overwrites `doc_id`. The document type is read from the `doc_type`
    /// (or `type`) metadata key and defaults to guideline.
    pub async fn add(
        &self,
        doc_id: &str,
        title: &str,
        content: &str,
        metadata: Value,
    ) -> Result<Document, StoreError> {
        validate_fields(doc_id, title, content)?;
        let Value::Object(metadata) = metadata else {
            return Err(ValidationError::new("metadata", "must be a JSON object").into());
        };
        let doc_type = doc_type_from(&metadata)?;

        let document = Document {
            doc_id: doc_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            doc_type,
            applicable_states: applicable_states_from(&metadata),
            metadata,
            last_updated: Utc::now(),
        };

        let mut documents = self.documents.write().await;
        self.persist(&document).await?;
        let replaced = documents.insert(document.doc_id.clone(), document.clone()).is_some();

        if replaced {
            info!(
                event_name = "documents.add.overwritten",
                doc_id = %document.doc_id,
                "existing document overwritten"
            );
        } else {
            info!(
                event_name = "documents.add.created",
                doc_id = %document.doc_id,
                "document added"
            );
        }

        Ok(document)
    }

    /// Cache first; a miss falls back to the document's file so files dropped into
    /// the directory after startup are still reachable.
    pub async fn get(&self, doc_id: &str) -> Result<Document, StoreError> {
        if let Some(document) = self.documents.read().await.get(doc_id) {
            return Ok(document.clone());
        }

        if !is_safe_id(doc_id) {
            return Err(StoreError::NotFound(doc_id.to_string()));
        }

        let path = self.path_for(doc_id);
        match fs::metadata(&path).await {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(doc_id.to_string()));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    context: format!("could not stat document file `{}`", path.display()),
                    source,
                });
            }
        }

        let document = read_document(&path).await?;
        self.documents.write().await.insert(document.doc_id.clone(), document.clone());
        debug!(event_name = "documents.get.loaded_from_disk", doc_id, "document loaded lazily");
        Ok(document)
    }

    /// Snapshot ordered by `doc_id`.
    pub async fn list(&self) -> Vec<Document> {
        self.documents.read().await.values().cloned().collect()
    }

    /// Case-insensitive substring match on content, and on the JSON text of the
    /// metadata when `search_metadata` is set. No ranking.
    pub async fn search(&self, query: &str, search_metadata: bool) -> Vec<Document> {
        let needle = query.to_lowercase();
        self.documents
            .read()
            .await
            .values()
            .filter(|document| {
                document.content.to_lowercase().contains(&needle)
                    || (search_metadata
                        && document.metadata_text().to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }

    pub async fn delete(&self, doc_id: &str) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        if !documents.contains_key(doc_id) {
            return Err(StoreError::NotFound(doc_id.to_string()));
        }

        let path = self.path_for(doc_id);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StoreError::Io {
                    context: format!("could not delete document file `{}`", path.display()),
                    source,
                });
            }
        }

        documents.remove(doc_id);
        info!(event_name = "documents.delete.completed", doc_id, "document deleted");
        Ok(())
    }

    /// Merges `fields` into the stored document. Only keys the document already has
    /// are applied; `doc_id` and `last_updated` are never taken from the caller.
    /// A top-level `applicable_states` is written through to the metadata.
    pub async fn update(
        &self,
        doc_id: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let mut documents = self.documents.write().await;
        let current =
            documents.get(doc_id).cloned().ok_or_else(|| StoreError::NotFound(doc_id.to_string()))?;

        let mut merged = match serde_json::to_value(&current) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(error) => {
                return Err(StoreError::Io {
                    context: format!("could not encode document `{doc_id}`"),
                    source: io::Error::other(error),
                });
            }
        };

        let mut metadata_changed = false;
        let mut states = None;
        for (key, value) in fields {
            if IMMUTABLE_FIELDS.contains(&key.as_str()) || !merged.contains_key(&key) {
                debug!(
                    event_name = "documents.update.field_ignored",
                    doc_id,
                    field = %key,
                    "ignoring field not settable on document"
                );
                continue;
            }
            if key == "applicable_states" {
                states = Some(value);
                continue;
            }
            metadata_changed |= key == "metadata";
            merged.insert(key, value);
        }

        let mut updated: Document = serde_json::from_value(Value::Object(merged))
            .map_err(|error| ValidationError::new("fields", error.to_string()))?;
        validate_fields(&updated.doc_id, &updated.title, &updated.content)?;
        match states {
            Some(states) => updated.set_applicable_states(states),
            None => {
                if metadata_changed {
                    updated.applicable_states.clear();
                }
                updated.reconcile_states();
            }
        }
        updated.last_updated = Utc::now();

        self.persist(&updated).await?;
        documents.insert(updated.doc_id.clone(), updated.clone());
        info!(event_name = "documents.update.completed", doc_id, "document updated");

        Ok(updated)
    }

    pub async fn by_type(&self, doc_type: DocType) -> Vec<Document> {
        self.documents
            .read()
            .await
            .values()
            .filter(|document| document.doc_type == doc_type)
            .cloned()
            .collect()
    }

    /// A document listing `all` matches every state.
    pub async fn by_state(&self, state: &str) -> Vec<Document> {
        self.documents
            .read()
            .await
            .values()
            .filter(|document| document.applies_to_state(state))
            .cloned()
            .collect()
    }

    /// Guideline documents for `business_type` (or with no business type, or `all`),
    /// optionally narrowed to those applicable in `state`.
    pub async fn guidelines_for(&self, business_type: &str, state: Option<&str>) -> Vec<Document> {
        let wanted = business_type.trim();
        self.documents
            .read()
            .await
            .values()
            .filter(|document| document.doc_type == DocType::Guideline)
            .filter(|document| match document.business_type() {
                None => true,
                Some(kind) => {
                    kind.eq_ignore_ascii_case(ALL_STATES) || kind.eq_ignore_ascii_case(wanted)
                }
            })
            .filter(|document| state.map_or(true, |state| document.applies_to_state(state)))
            .cloned()
            .collect()
    }

    fn path_for(&self, doc_id: &str) -> PathBuf {
        self.root.join(format!("{doc_id}.json"))
    }

    async fn persist(&self, document: &Document) -> Result<(), StoreError> {
        let path = self.path_for(&document.doc_id);
        let bytes = serde_json::to_vec_pretty(document).map_err(|error| StoreError::Io {
            context: format!("could not encode document `{}`", document.doc_id),
            source: io::Error::other(error),
        })?;

        fs::write(&path, bytes).await.map_err(|source| StoreError::Io {
            context: format!("could not write document file `{}`", path.display()),
            source,
        })
    }
}

#[async_trait]
impl GuidelineSource for DocumentStore {
    async fn guidelines_for(
        &self,
        business_type: &str,
        state: Option<&str>,
    ) -> Result<Vec<Document>, ApplicationError> {
        Ok(DocumentStore::guidelines_for(self, business_type, state).await)
    }
}

async fn read_document(path: &Path) -> Result<Document, StoreError> {
    let raw = fs::read_to_string(path).await.map_err(|source| StoreError::Io {
        context: format!("could not read document file `{}`", path.display()),
        source,
    })?;

    let mut document =
        serde_json::from_str::<Document>(&raw).map_err(|error| StoreError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
            raw,
        })?;
    document.reconcile_states();
    Ok(document)
}

fn validate_fields(doc_id: &str, title: &str, content: &str) -> Result<(), ValidationError> {
    if doc_id.trim().is_empty() {
        return Err(ValidationError::new("doc_id", "must not be empty"));
    }
    if !is_safe_id(doc_id) {
        return Err(ValidationError::new("doc_id", "must not contain path separators or `..`"));
    }
    if title.trim().is_empty() {
        return Err(ValidationError::new("title", "must not be empty"));
    }
    if content.trim().is_empty() {
        return Err(ValidationError::new("content", "must not be empty"));
    }
    Ok(())
}

fn is_safe_id(doc_id: &str) -> bool {
    !doc_id.is_empty() && !doc_id.contains(['/', '\\']) && !doc_id.contains("..")
}

fn doc_type_from(metadata: &Map<String, Value>) -> Result<DocType, ValidationError> {
    match metadata.get("doc_type").or_else(|| metadata.get("type")) {
        None | Some(Value::Null) => Ok(DocType::Guideline),
        Some(Value::String(label)) => label.parse(),
        Some(other) => Err(ValidationError::new("doc_type", format!("`{other}` is not a string"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};
    use tempfile::TempDir;

    use autouw_core::domain::document::DocType;

    use super::{doc_type_from, is_safe_id, DocumentStore, StoreError};

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn doc_type_defaults_to_guideline_and_reads_either_key() {
        assert_eq!(doc_type_from(&Map::new()).ok(), Some(DocType::Guideline));
        assert_eq!(
            doc_type_from(&fields(json!({"type": "regulation"}))).ok(),
            Some(DocType::Regulation)
        );
        assert_eq!(
            doc_type_from(&fields(json!({"doc_type": "policy"}))).ok(),
            Some(DocType::Policy)
        );
        assert!(doc_type_from(&fields(json!({"doc_type": "memo"}))).is_err());
    }

    #[test]
    fn ids_cannot_escape_the_root() {
        assert!(is_safe_id("gl-restaurant-001"));
        assert!(!is_safe_id("../etc/passwd"));
        assert!(!is_safe_id("nested/doc"));
        assert!(!is_safe_id(""));
    }

    #[tokio::test]
    async fn update_ignores_unknown_and_immutable_keys() {
        let dir = TempDir::new().expect("tempdir");
        let store = DocumentStore::open(dir.path()).await.expect("open store");
        let original = store
            .add("gl-1", "Restaurant guideline", "Hood suppression required.", json!({}))
            .await
            .expect("add");

        let updated = store
            .update(
                "gl-1",
                fields(json!({
                    "content": "Updated content",
                    "doc_id": "hijacked",
                    "colour": "blue"
                })),
            )
            .await
            .expect("update");

        assert_eq!(updated.doc_id, "gl-1");
        assert_eq!(updated.content, "Updated content");
        assert_eq!(updated.title, original.title);
        assert!(updated.last_updated >= original.last_updated);
        assert!(matches!(store.get("hijacked").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_rederives_states_from_new_metadata() {
        let dir = TempDir::new().expect("tempdir");
        let store = DocumentStore::open(dir.path()).await.expect("open store");
        store
            .add("reg-1", "Regulation", "State rules.", json!({"type": "regulation"}))
            .await
            .expect("add");

        let updated = store
            .update("reg-1", fields(json!({"metadata": {"applicable_states": ["tx"]}})))
            .await
            .expect("update");

        assert_eq!(updated.applicable_states, vec!["TX".to_string()]);
        assert_eq!(store.by_state("CA").await.len(), 0);
    }

    #[tokio::test]
    async fn update_of_states_is_mirrored_into_metadata() {
        let dir = TempDir::new().expect("tempdir");
        let store = DocumentStore::open(dir.path()).await.expect("open store");
        store
            .add(
                "reg-tx",
                "Texas rules",
                "State filing rules.",
                json!({"applicable_states": ["TX"]}),
            )
            .await
            .expect("add");

        let updated = store
            .update("reg-tx", fields(json!({"applicable_states": ["ny"]})))
            .await
            .expect("update");

        assert_eq!(updated.applicable_states, vec!["NY".to_string()]);
        assert_eq!(updated.metadata["applicable_states"], json!(["NY"]));
        assert!(store.search("tx", true).await.is_empty());
        assert_eq!(store.by_state("TX").await.len(), 0);

        let reopened = DocumentStore::open(dir.path()).await.expect("reopen");
        let stored = reopened.get("reg-tx").await.expect("get");
        assert_eq!(stored.applicable_states, vec!["NY".to_string()]);
    }

    #[tokio::test]
    async fn update_rejects_values_that_break_the_document() {
        let dir = TempDir::new().expect("tempdir");
        let store = DocumentStore::open(dir.path()).await.expect("open store");
        store.add("gl-2", "Guideline", "Body", json!({})).await.expect("add");

        let blank = store.update("gl-2", fields(json!({"title": "  "}))).await;
        let bad_type = store.update("gl-2", fields(json!({"doc_type": "memo"}))).await;

        assert!(matches!(blank, Err(StoreError::Validation(ref error)) if error.field == "title"));
        assert!(matches!(bad_type, Err(StoreError::Validation(_))));
        assert_eq!(store.get("gl-2").await.expect("still stored").title, "Guideline");
    }
}
