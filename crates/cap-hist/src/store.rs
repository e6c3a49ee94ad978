//! Persisted key-value store collaborator.
//!
//! A store maps a path to a document holding named integer scalars and named
//! accumulator groups. Handles are opened and closed within a single save or
//! load call; nothing is cached between calls.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use cap_core::errors::{CapError, ErrorInfo};
use cap_core::provenance::SchemaVersion;
use serde::{Deserialize, Serialize};

use crate::group::AccumulatorGroup;
use crate::hash::stable_hash_string;
use crate::serde::{from_json_slice, to_canonical_json_bytes};

/// Schema version written into every document.
pub const DOCUMENT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// How a document is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenMode {
    /// Existing document, read-only.
    Read,
    /// Fresh document; existing content is discarded on close.
    Create,
    /// Existing document reopened for update, or a fresh one when absent.
    CreateIfAbsent,
}

/// Content of one persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Schema of the payload.
    #[serde(default)]
    pub schema: SchemaVersion,
    /// Named integer scalars (event counters, indices).
    #[serde(default)]
    pub scalars: BTreeMap<String, i64>,
    /// Named accumulator groups.
    #[serde(default)]
    pub groups: BTreeMap<String, AccumulatorGroup>,
    /// SHA-256 of the canonical scalars and groups, refreshed on close.
    #[serde(default)]
    pub digest: String,
}

#[derive(Serialize)]
struct DigestView<'a> {
    scalars: &'a BTreeMap<String, i64>,
    groups: &'a BTreeMap<String, AccumulatorGroup>,
}

impl StoreDocument {
    fn compute_digest(&self) -> Result<String, CapError> {
        stable_hash_string(&DigestView {
            scalars: &self.scalars,
            groups: &self.groups,
        })
    }

    fn seal(&mut self) -> Result<(), CapError> {
        self.schema = DOCUMENT_SCHEMA;
        self.digest = self.compute_digest()?;
        Ok(())
    }

    fn verify(&self, path: &Path) -> Result<(), CapError> {
        if !DOCUMENT_SCHEMA.is_compatible_with(&self.schema) {
            return Err(store_error("store-schema", "incompatible document schema", path));
        }
        if self.digest != self.compute_digest()? {
            return Err(CapError::Store(
                ErrorInfo::new("store-digest", "document digest mismatch")
                    .with_context("path", path.display().to_string())
                    .with_hint("the file was modified outside of CAP"),
            ));
        }
        Ok(())
    }
}

fn store_error(code: &str, message: impl Into<String>, path: &Path) -> CapError {
    CapError::Store(ErrorInfo::new(code, message).with_context("path", path.display().to_string()))
}

/// Opens documents by path.
pub trait KeyValueStore {
    /// Opens `path` in `mode`. Failure to open is reported as an error.
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn StoreHandle>, CapError>;

    /// Returns true when a document exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// An open document.
pub trait StoreHandle {
    /// Path the handle was opened at.
    fn path(&self) -> &Path;

    /// Stores an integer scalar.
    fn write_scalar(&mut self, name: &str, value: i64) -> Result<(), CapError>;

    /// Reads an integer scalar; a missing name is an error.
    fn read_scalar(&self, name: &str) -> Result<i64, CapError>;

    /// Stores a copy of `group` under its name; NaN or infinite weights are rejected.
    fn write_group(&mut self, group: &AccumulatorGroup) -> Result<(), CapError>;

    /// Reads the group called `name`.
    fn read_group(&self, name: &str) -> Result<AccumulatorGroup, CapError>;

    /// Names of every stored group.
    fn group_names(&self) -> Vec<String>;

    /// Flushes pending writes and releases the handle.
    fn close(self: Box<Self>) -> Result<(), CapError>;
}

enum Backend {
    File,
    Memory(Rc<RefCell<BTreeMap<PathBuf, StoreDocument>>>),
}

struct DocumentHandle {
    path: PathBuf,
    mode: OpenMode,
    document: StoreDocument,
    backend: Backend,
}

impl DocumentHandle {
    fn ensure_writable(&self) -> Result<(), CapError> {
        if self.mode == OpenMode::Read {
            return Err(store_error(
                "store-read-only",
                "document was opened read-only",
                &self.path,
            ));
        }
        Ok(())
    }
}

impl StoreHandle for DocumentHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_scalar(&mut self, name: &str, value: i64) -> Result<(), CapError> {
        self.ensure_writable()?;
        self.document.scalars.insert(name.to_string(), value);
        Ok(())
    }

    fn read_scalar(&self, name: &str) -> Result<i64, CapError> {
        self.document.scalars.get(name).copied().ok_or_else(|| {
            CapError::Store(
                ErrorInfo::new("store-scalar-missing", "no such scalar in document")
                    .with_context("path", self.path.display().to_string())
                    .with_context("name", name),
            )
        })
    }

    fn write_group(&mut self, group: &AccumulatorGroup) -> Result<(), CapError> {
        self.ensure_writable()?;
        if let Some(histogram) = group.histograms().find(|histogram| !histogram.is_finite()) {
            return Err(CapError::Store(
                ErrorInfo::new("store-non-finite", "histogram holds NaN or infinite weights")
                    .with_context("path", self.path.display().to_string())
                    .with_context("group", group.name())
                    .with_context("histogram", histogram.name()),
            ));
        }
        self.document
            .groups
            .insert(group.name().to_string(), group.clone());
        Ok(())
    }

    fn read_group(&self, name: &str) -> Result<AccumulatorGroup, CapError> {
        self.document.groups.get(name).cloned().ok_or_else(|| {
            CapError::Store(
                ErrorInfo::new("store-group-missing", "no such group in document")
                    .with_context("path", self.path.display().to_string())
                    .with_context("group", name),
            )
        })
    }

    fn group_names(&self) -> Vec<String> {
        self.document.groups.keys().cloned().collect()
    }

    fn close(self: Box<Self>) -> Result<(), CapError> {
        if self.mode == OpenMode::Read {
            return Ok(());
        }
        let DocumentHandle {
            path,
            mut document,
            backend,
            ..
        } = *self;
        document.seal()?;
        match backend {
            Backend::File => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|err| {
                        store_error("store-mkdir", err.to_string(), parent)
                    })?;
                }
                let bytes = to_canonical_json_bytes(&document)?;
                fs::write(&path, bytes)
                    .map_err(|err| store_error("store-write", err.to_string(), &path))?;
                tracing::debug!(path = %path.display(), "document written");
            }
            Backend::Memory(documents) => {
                documents.borrow_mut().insert(path, document);
            }
        }
        Ok(())
    }
}

/// Store writing one canonical JSON file per document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileStore;

impl JsonFileStore {
    /// Creates the store.
    pub fn new() -> Self {
        Self
    }

    fn read_document(path: &Path) -> Result<StoreDocument, CapError> {
        let bytes =
            fs::read(path).map_err(|err| store_error("store-open", err.to_string(), path))?;
        let document: StoreDocument = from_json_slice(&bytes)?;
        document.verify(path)?;
        Ok(document)
    }
}

impl KeyValueStore for JsonFileStore {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn StoreHandle>, CapError> {
        let document = match mode {
            OpenMode::Read => Self::read_document(path)?,
            OpenMode::Create => StoreDocument::default(),
            OpenMode::CreateIfAbsent if path.exists() => Self::read_document(path)?,
            OpenMode::CreateIfAbsent => StoreDocument::default(),
        };
        Ok(Box::new(DocumentHandle {
            path: path.to_path_buf(),
            mode,
            document,
            backend: Backend::File,
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-process store, shared by clones. Handy for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Rc<RefCell<BTreeMap<PathBuf, StoreDocument>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every stored document, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.documents.borrow().keys().cloned().collect()
    }

    /// Copy of the document at `path`.
    pub fn document(&self, path: &Path) -> Option<StoreDocument> {
        self.documents.borrow().get(path).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn StoreHandle>, CapError> {
        let existing = self.documents.borrow().get(path).cloned();
        let document = match (mode, existing) {
            (OpenMode::Read, Some(document)) => document,
            (OpenMode::Read, None) => {
                return Err(store_error("store-open", "no document at path", path));
            }
            (OpenMode::Create, _) => StoreDocument::default(),
            (OpenMode::CreateIfAbsent, existing) => existing.unwrap_or_default(),
        };
        Ok(Box::new(DocumentHandle {
            path: path.to_path_buf(),
            mode,
            document,
            backend: Backend::Memory(Rc::clone(&self.documents)),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.documents.borrow().contains_key(path)
    }
}
