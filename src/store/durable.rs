//! Durable store — a versioned JSON document, committed on every mutation
//!
//! Each mutating call rewrites the backing file before returning: the
//! orchestration immediately re-reads state in the next step, so deferred
//! or batched commits would be observably inconsistent. Records are keyed
//! by surrogate integer ids; parent/child and source/module references are
//! foreign keys with delete-nullify semantics (handled above this layer by
//! the `Accessor` operations).

use super::Accessor;
use crate::source::{ModuleId, ModuleRecord, SourceId, SourceRecord};
use crate::{FathomError, FathomResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    next_source: u64,
    next_module: u64,
    sources: BTreeMap<u64, SourceRecord>,
    modules: BTreeMap<u64, ModuleRecord>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            next_source: 1,
            next_module: 1,
            sources: BTreeMap::new(),
            modules: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct DurableStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl DurableStore {
    /// Open the store at `path`, loading an existing document or starting
    /// fresh. A document with a different version is refused rather than
    /// silently migrated.
    pub fn open(path: impl Into<PathBuf>) -> FathomResult<Self> {
        let path = path.into();
        let doc = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let doc: StoreDocument = serde_json::from_str(&content)?;
            if doc.version != STORE_VERSION {
                return Err(FathomError::StoreVersion {
                    path,
                    found: doc.version,
                    expected: STORE_VERSION,
                });
            }
            tracing::info!(
                "loaded durable store ({} sources, {} modules)",
                doc.sources.len(),
                doc.modules.len()
            );
            doc
        } else {
            StoreDocument::default()
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronous commit: serialize the whole document and rewrite the
    /// backing file. Called by every mutating `Accessor` method before it
    /// returns.
    fn commit(&self) -> FathomResult<()> {
        let content = serde_json::to_string_pretty(&self.doc)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Accessor for DurableStore {
    fn persist_source(&mut self, mut record: SourceRecord) -> FathomResult<SourceId> {
        if !record.id.is_assigned() {
            record.id = SourceId(self.doc.next_source);
            self.doc.next_source += 1;
        } else if record.id.0 >= self.doc.next_source {
            self.doc.next_source = record.id.0 + 1;
        }
        let id = record.id;
        self.doc.sources.insert(id.0, record);
        self.commit()?;
        Ok(id)
    }

    fn retrieve_source(&self, id: SourceId) -> FathomResult<SourceRecord> {
        self.doc
            .sources
            .get(&id.0)
            .cloned()
            .ok_or(FathomError::UnknownSource(id))
    }

    fn persist_module(&mut self, mut record: ModuleRecord) -> FathomResult<ModuleId> {
        if !record.id.is_assigned() {
            record.id = ModuleId(self.doc.next_module);
            self.doc.next_module += 1;
        } else if record.id.0 >= self.doc.next_module {
            self.doc.next_module = record.id.0 + 1;
        }
        let id = record.id;
        self.doc.modules.insert(id.0, record);
        self.commit()?;
        Ok(id)
    }

    fn retrieve_module(&self, id: ModuleId) -> FathomResult<ModuleRecord> {
        self.doc
            .modules
            .get(&id.0)
            .cloned()
            .ok_or(FathomError::UnknownModule(id))
    }

    fn source_ids(&self) -> Vec<SourceId> {
        self.doc.sources.keys().map(|&k| SourceId(k)).collect()
    }
}
