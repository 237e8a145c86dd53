//! Persistence boundary — the `Accessor` repository trait
//!
//! Every structural mutation of the characterization tree (child
//! management, provenance attachment, clump formation, timers) funnels
//! through this trait, so the orchestration runs unchanged against the
//! transient [`MemoryStore`] or the synchronously committed
//! [`DurableStore`]. Cross-object references are surrogate-id foreign
//! keys, never native references.

pub mod durable;
pub mod memory;

pub use durable::DurableStore;
pub use memory::MemoryStore;

use crate::source::{
    Message, ModuleId, ModuleRecord, Property, SourceId, SourceKind, SourceRecord,
};
use crate::identify::FormatIdentification;
use crate::{FathomError, FathomResult};

/// Repository boundary for the two aggregate roots, `SourceRecord` and
/// `ModuleRecord`.
///
/// Backend contract:
/// - `persist_*` is idempotent: an unassigned record receives a fresh
///   surrogate id; an already-assigned record is upserted and its existing
///   handle returned, never duplicated.
/// - `retrieve_*` for an unknown key is a hard error
///   ([`FathomError::UnknownSource`]/[`FathomError::UnknownModule`]), never
///   an ambiguous empty result.
/// - Every mutating call observably completes before it returns; the
///   orchestration re-reads state in the very next step.
pub trait Accessor {
    fn persist_source(&mut self, record: SourceRecord) -> FathomResult<SourceId>;
    fn retrieve_source(&self, id: SourceId) -> FathomResult<SourceRecord>;
    fn persist_module(&mut self, record: ModuleRecord) -> FathomResult<ModuleId>;
    fn retrieve_module(&self, id: ModuleId) -> FathomResult<ModuleRecord>;

    /// All source ids known to the store, ascending.
    fn source_ids(&self) -> Vec<SourceId>;

    // ── Child management ───────────────────────────────────────────

    /// Append `child` under `parent`, returning the child's canonical
    /// handle. Rejects a child that already has a different parent and any
    /// edge that would make the tree cyclic. Re-attaching an existing edge
    /// is a no-op.
    fn add_child(&mut self, parent: SourceId, child: SourceId) -> FathomResult<SourceId> {
        if parent == child {
            return Err(FathomError::WouldCycle { parent, child });
        }
        let mut child_record = self.retrieve_source(child)?;
        if let Some(current) = child_record.parent {
            if current == parent {
                return Ok(child);
            }
            return Err(FathomError::AlreadyParented {
                child,
                current,
                requested: parent,
            });
        }
        // The edge is cyclic iff `child` is already an ancestor of `parent`.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(FathomError::WouldCycle { parent, child });
            }
            cursor = self.retrieve_source(id)?.parent;
        }
        let mut parent_record = self.retrieve_source(parent)?;
        if !parent_record.children.contains(&child) {
            parent_record.children.push(child);
        }
        child_record.parent = Some(parent);
        self.persist_source(parent_record)?;
        self.persist_source(child_record)?;
        Ok(child)
    }

    /// Detach `child` from `parent` (delete-nullify). The child's own
    /// subtree is untouched; only the parent link is severed.
    fn remove_child(&mut self, parent: SourceId, child: SourceId) -> FathomResult<SourceId> {
        let mut parent_record = self.retrieve_source(parent)?;
        let mut child_record = self.retrieve_source(child)?;
        parent_record.children.retain(|&id| id != child);
        if child_record.parent == Some(parent) {
            child_record.parent = None;
        }
        self.persist_source(parent_record)?;
        self.persist_source(child_record)?;
        Ok(child)
    }

    // ── Provenance ─────────────────────────────────────────────────

    /// Persist `module` and attach it to `source`, returning its handle.
    fn add_module(&mut self, source: SourceId, module: ModuleRecord) -> FathomResult<ModuleId> {
        let module_id = self.persist_module(module)?;
        let mut record = self.retrieve_source(source)?;
        record.modules.push(module_id);
        self.persist_source(record)?;
        Ok(module_id)
    }

    fn add_message(&mut self, source: SourceId, message: Message) -> FathomResult<()> {
        let mut record = self.retrieve_source(source)?;
        record.messages.push(message);
        self.persist_source(record)?;
        Ok(())
    }

    fn add_property(&mut self, source: SourceId, property: Property) -> FathomResult<()> {
        let mut record = self.retrieve_source(source)?;
        record.properties.push(property);
        self.persist_source(record)?;
        Ok(())
    }

    /// Insert one presumptive identification; returns whether it was new
    /// (set semantics, deduplicated by the identification's equality).
    fn add_presumptive_format(
        &mut self,
        source: SourceId,
        identification: FormatIdentification,
    ) -> FathomResult<bool> {
        let mut record = self.retrieve_source(source)?;
        let inserted = record.formats.insert(identification);
        self.persist_source(record)?;
        Ok(inserted)
    }

    /// Insert several presumptive identifications; returns how many were new.
    fn add_presumptive_formats(
        &mut self,
        source: SourceId,
        identifications: Vec<FormatIdentification>,
    ) -> FathomResult<usize> {
        let mut record = self.retrieve_source(source)?;
        let mut inserted = 0;
        for identification in identifications {
            if record.formats.insert(identification) {
                inserted += 1;
            }
        }
        self.persist_source(record)?;
        Ok(inserted)
    }

    fn start_timer(&mut self, source: SourceId) -> FathomResult<()> {
        let mut record = self.retrieve_source(source)?;
        record.timer.start();
        self.persist_source(record)?;
        Ok(())
    }

    fn end_timer(&mut self, source: SourceId) -> FathomResult<()> {
        let mut record = self.retrieve_source(source)?;
        record.timer.end();
        self.persist_source(record)?;
        Ok(())
    }

    // ── Clump formation ────────────────────────────────────────────

    /// Re-parent `members` (existing children of `parent`) under a freshly
    /// created Clump, which itself becomes a child of `parent`.
    ///
    /// Every precondition is validated before the first mutation, so the
    /// detach/attach sequence cannot fail halfway: after the call each
    /// member has exactly one parent — the new Clump.
    fn form_clump(&mut self, parent: SourceId, members: &[SourceId]) -> FathomResult<SourceId> {
        if members.is_empty() {
            return Err(FathomError::EmptyClump);
        }
        let parent_record = self.retrieve_source(parent)?;
        for &member in members {
            let member_record = self.retrieve_source(member)?;
            if member_record.parent != Some(parent) || !parent_record.children.contains(&member) {
                return Err(FathomError::ClumpMember { parent, member });
            }
        }
        let clump = self.persist_source(SourceRecord::new(SourceKind::Clump))?;
        for &member in members {
            self.remove_child(parent, member)?;
            self.add_child(clump, member)?;
        }
        self.add_child(parent, clump)?;
        Ok(clump)
    }
}
