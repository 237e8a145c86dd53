//! Container-walking handlers — directories and file sets
//!
//! These drive the recursion of the characterization walk: each child
//! they discover (or were handed at input resolution) is characterized in
//! turn, with per-child failures caught and recorded so one unreadable
//! entry never poisons its siblings.

use crate::characterize::Characterizer;
use crate::dispatch::{Capabilities, FormatHandler, ModuleMeta, SourceInput};
use crate::source::{SourceId, SourceKind, SourceRecord};
use crate::store::Accessor;
use crate::FathomResult;
use walkdir::WalkDir;

/// Walks a directory's immediate entries, creating and characterizing a
/// child source per entry. Nested directories recurse through their own
/// dispatch, keeping the walk depth-first.
#[derive(Debug, Default)]
pub struct DirectoryHandler;

impl DirectoryHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for DirectoryHandler {
    fn meta(&self) -> ModuleMeta {
        ModuleMeta::new("fathom/directory-handler", env!("CARGO_PKG_VERSION"))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::parser()
    }

    fn accepts(&self, kind: &SourceKind) -> bool {
        matches!(kind, SourceKind::Directory { .. })
    }

    fn parse(
        &self,
        chr: &Characterizer,
        store: &mut dyn Accessor,
        source: SourceId,
        _input: &mut SourceInput,
    ) -> FathomResult<u64> {
        let record = store.retrieve_source(source)?;
        let SourceKind::Directory { path } = &record.kind else {
            return Ok(0);
        };

        // Sorted traversal keeps child order deterministic across runs.
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            let kind = if entry.file_type().is_dir() {
                SourceKind::Directory { path: entry.path().to_path_buf() }
            } else {
                SourceKind::File { path: entry.path().to_path_buf() }
            };
            let child = store.persist_source(SourceRecord::new(kind))?;
            store.add_child(source, child)?;
            if let Err(error) = chr.characterize(store, child) {
                chr.note_source_failure(store, child, &error)?;
            }
        }
        Ok(0)
    }
}

/// Characterizes the pre-attached children of a synthetic file-set root.
#[derive(Debug, Default)]
pub struct FileSetHandler;

impl FileSetHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for FileSetHandler {
    fn meta(&self) -> ModuleMeta {
        ModuleMeta::new("fathom/file-set-handler", env!("CARGO_PKG_VERSION"))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::parser()
    }

    fn accepts(&self, kind: &SourceKind) -> bool {
        matches!(kind, SourceKind::FileSet)
    }

    fn parse(
        &self,
        chr: &Characterizer,
        store: &mut dyn Accessor,
        source: SourceId,
        _input: &mut SourceInput,
    ) -> FathomResult<u64> {
        let children = store.retrieve_source(source)?.children;
        for child in children {
            if let Err(error) = chr.characterize(store, child) {
                chr.note_source_failure(store, child, &error)?;
            }
        }
        Ok(0)
    }
}
