//! In-memory store — arena + index, no I/O
//!
//! The transient backend: mutations apply directly to in-process maps.
//! Suited to one-shot runs where the report is rendered before the
//! process exits.

use super::Accessor;
use crate::source::{ModuleId, ModuleRecord, SourceId, SourceRecord};
use crate::{FathomError, FathomResult};
use std::collections::HashMap;

#[derive(Debug)]
pub struct MemoryStore {
    sources: HashMap<u64, SourceRecord>,
    modules: HashMap<u64, ModuleRecord>,
    next_source: u64,
    next_module: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            modules: HashMap::new(),
            next_source: 1,
            next_module: 1,
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

impl Accessor for MemoryStore {
    fn persist_source(&mut self, mut record: SourceRecord) -> FathomResult<SourceId> {
        if !record.id.is_assigned() {
            record.id = SourceId(self.next_source);
            self.next_source += 1;
        } else if record.id.0 >= self.next_source {
            self.next_source = record.id.0 + 1;
        }
        let id = record.id;
        self.sources.insert(id.0, record);
        Ok(id)
    }

    fn retrieve_source(&self, id: SourceId) -> FathomResult<SourceRecord> {
        self.sources
            .get(&id.0)
            .cloned()
            .ok_or(FathomError::UnknownSource(id))
    }

    fn persist_module(&mut self, mut record: ModuleRecord) -> FathomResult<ModuleId> {
        if !record.id.is_assigned() {
            record.id = ModuleId(self.next_module);
            self.next_module += 1;
        } else if record.id.0 >= self.next_module {
            self.next_module = record.id.0 + 1;
        }
        let id = record.id;
        self.modules.insert(id.0, record);
        Ok(id)
    }

    fn retrieve_module(&self, id: ModuleId) -> FathomResult<ModuleRecord> {
        self.modules
            .get(&id.0)
            .cloned()
            .ok_or(FathomError::UnknownModule(id))
    }

    fn source_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self.sources.keys().map(|&k| SourceId(k)).collect();
        ids.sort();
        ids
    }
}
