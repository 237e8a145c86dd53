//! Source model — the characterization tree
//!
//! A [`SourceRecord`] is one node in the tree: a file, URL, directory,
//! container-extracted sub-object, synthetic file set, or clump. Nodes
//! reference each other and their provenance [`ModuleRecord`]s purely by
//! surrogate id, so the same tree works against any [`crate::Accessor`]
//! backend without native-reference aliasing.

use crate::dispatch::Validity;
use crate::identify::{FormatIdentification, IdentificationSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ─── Surrogate Keys ────────────────────────────────────────────────

/// Surrogate key of a source record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SourceId(pub u64);

impl SourceId {
    /// Sentinel for a record not yet assigned by a store.
    pub const UNASSIGNED: SourceId = SourceId(0);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source/{}", self.0)
    }
}

/// Surrogate key of a module (provenance) record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ModuleId(pub u64);

impl ModuleId {
    pub const UNASSIGNED: ModuleId = ModuleId(0);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module/{}", self.0)
    }
}

// ─── Messages ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("INFO"),
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// A severity-tagged, timestamped note attached to a source or an
/// identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Severity::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.text)
    }
}

// ─── Timers ────────────────────────────────────────────────────────

/// Wall-clock bracket around a processing step or a source's whole
/// characterization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerInfo {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TimerInfo {
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.ended_at = None;
    }

    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_none()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

// ─── Properties ────────────────────────────────────────────────────

/// A parsed fact attached by a handler, e.g. `riff.form.type = WAVE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// ─── Source Kind ───────────────────────────────────────────────────

/// What kind of object a source node represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// A plain filesystem file.
    File { path: PathBuf },
    /// A filesystem directory; children are its entries.
    Directory { path: PathBuf },
    /// A URL input, fetched into a local spool file for the run.
    Url { url: String, spool: PathBuf },
    /// Synthetic root grouping several top-level inputs.
    FileSet,
    /// A sub-object extracted from a container during parsing.
    Embedded { name: String },
    /// A dynamically discovered group of sibling sources forming one
    /// logical formatted object.
    Clump,
}

impl SourceKind {
    /// Aggregate sources hold independently-formatted children that each
    /// get recursively characterized.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            SourceKind::Directory { .. } | SourceKind::FileSet | SourceKind::Clump
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::File { .. } => "file",
            SourceKind::Directory { .. } => "directory",
            SourceKind::Url { .. } => "url",
            SourceKind::FileSet => "file-set",
            SourceKind::Embedded { .. } => "embedded",
            SourceKind::Clump => "clump",
        }
    }

    /// The local path holding this source's bytes, when it has any.
    /// Directories, file sets, clumps, and embedded sub-objects have none.
    pub fn byte_path(&self) -> Option<&Path> {
        match self {
            SourceKind::File { path } => Some(path),
            SourceKind::Url { spool, .. } => Some(spool),
            _ => None,
        }
    }

    /// Human-readable name for reports and logs.
    pub fn display_name(&self) -> String {
        match self {
            SourceKind::File { path } | SourceKind::Directory { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            SourceKind::Url { url, .. } => url.clone(),
            SourceKind::FileSet => "(file set)".to_string(),
            SourceKind::Embedded { name } => name.clone(),
            SourceKind::Clump => "(clump)".to_string(),
        }
    }
}

// ─── Source Record ─────────────────────────────────────────────────

/// One node in the characterization tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: SourceId,
    pub kind: SourceKind,
    pub parent: Option<SourceId>,
    /// Ordered child ids.
    pub children: Vec<SourceId>,
    /// Provenance: every module that processed this source, in order.
    pub modules: Vec<ModuleId>,
    /// Deduplicated presumptive format identifications.
    pub formats: IdentificationSet,
    pub messages: Vec<Message>,
    pub properties: Vec<Property>,
    pub timer: TimerInfo,
}

impl SourceRecord {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            id: SourceId::UNASSIGNED,
            kind,
            parent: None,
            children: Vec::new(),
            modules: Vec::new(),
            formats: IdentificationSet::new(),
            messages: Vec::new(),
            properties: Vec::new(),
            timer: TimerInfo::default(),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.kind.is_aggregate()
    }

    /// The most trusted identification under the deterministic total
    /// order — the set's minimum.
    pub fn best_format(&self) -> Option<&FormatIdentification> {
        self.formats.iter().next()
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

// ─── Module Record ─────────────────────────────────────────────────

/// Provenance record of one processing step applied to a source — the
/// step's metadata, not its logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub name: String,
    pub version: String,
    pub release_date: Option<String>,
    pub rights: Option<String>,
    /// Verdict when the step validated the source.
    pub validity: Option<Validity>,
    /// Descriptor of an externally wrapped tool, when the step shells out.
    pub wrapped_tool: Option<String>,
    pub timer: TimerInfo,
}

impl ModuleRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: ModuleId::UNASSIGNED,
            name: name.into(),
            version: version.into(),
            release_date: None,
            rights: None,
            validity: None,
            wrapped_tool: None,
            timer: TimerInfo::default(),
        }
    }
}
