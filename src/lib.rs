//! # fathom — Digital Object Characterization Engine
//!
//! Given a file, URL, or directory, fathom determines the object's
//! format(s) with a confidence ranking, dispatches it to format-specific
//! handlers for parsing and validation, recursively characterizes any
//! contained sub-objects, and optionally computes content digests —
//! producing a provenance-annotated report tree.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Characterizer                          │
//! │  ┌───────────┐ ┌────────────┐ ┌───────────┐ ┌───────────┐  │
//! │  │ Identifier│ │ Handler    │ │ Aggregate │ │ Digester  │  │
//! │  │ (magic +  │ │ Registry   │ │ probe     │ │ (SHA-256, │  │
//! │  │  ext)     │ │ (format →  │ │ (clumps)  │ │  CRC32)   │  │
//! │  └─────┬─────┘ │  factory)  │ └─────┬─────┘ └─────┬─────┘  │
//! │        │       └─────┬──────┘       │             │        │
//! │  ┌─────▼─────────────▼──────────────▼─────────────▼──────┐ │
//! │  │   identify → dispatch → aggregate → digest → recurse  │ │
//! │  └──────────────────────────┬────────────────────────────┘ │
//! │                             │                              │
//! │  ┌──────────────────────────▼────────────────────────────┐ │
//! │  │  Accessor (persistence boundary)                      │ │
//! │  │  MemoryStore (arena)  │  DurableStore (JSON, synced)  │ │
//! │  └───────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//!
//! - **Format identification**: magic-byte and extension signatures with a
//!   six-level confidence ranking and a deterministic total order
//! - **Capability dispatch**: handlers declare identify/parse/validate/digest
//!   support up front; the dispatcher invokes exactly the declared subset
//! - **Clump detection**: sibling files that form one logical object (e.g.
//!   a shapefile's `.shp`/`.dbf`/`.prj` triple) are re-parented under a
//!   synthetic composite source
//! - **Swappable persistence**: the orchestration runs unchanged against a
//!   transient in-memory store or a durably committed on-disk store
//! - **Digest provenance**: SHA-256 and CRC32 checksums attached per source
//! - **Report tree**: JSON and text renderings of the characterized tree

pub mod characterize;
pub mod dispatch;
pub mod handlers;
pub mod identify;
pub mod report;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use characterize::{Characterizer, CharacterizerBuilder, FathomConfig};
pub use dispatch::{
    Aggregator, Capabilities, ClumpMatch, Coverage, FormatHandler, HandlerRegistry, Validity,
};
pub use identify::{Confidence, FormatId, FormatIdentification};
pub use report::{render_report, write_report, ReportFormat};
pub use source::{Message, ModuleId, ModuleRecord, Severity, SourceId, SourceKind, SourceRecord};
pub use store::{Accessor, DurableStore, MemoryStore};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FathomError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("unknown source id {0}")]
    UnknownSource(SourceId),

    #[error("unknown module id {0}")]
    UnknownModule(ModuleId),

    #[error("source {child} already has parent {current}, cannot attach under {requested}")]
    AlreadyParented {
        child: SourceId,
        current: SourceId,
        requested: SourceId,
    },

    #[error("attaching {child} under {parent} would create a cycle")]
    WouldCycle { parent: SourceId, child: SourceId },

    #[error("clump member {member} is not a child of {parent}")]
    ClumpMember { parent: SourceId, member: SourceId },

    #[error("clump formation requires at least one member")]
    EmptyClump,

    #[error("store document {} has version {found}, expected {expected}", .path.display())]
    StoreVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("run deadline exceeded before invoking {step}")]
    DeadlineExceeded { step: String },

    #[error("aborting run after {0} failed sources")]
    TooManyFailures(usize),
}

pub type FathomResult<T> = Result<T, FathomError>;
