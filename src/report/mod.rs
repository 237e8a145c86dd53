//! Report generation — JSON and text renderings of the characterized tree
//!
//! The final report enumerates, per source, every handler that ran with
//! its timing and validation verdict, the identifications attempted, the
//! parsed properties, and all severity-tagged messages.

pub mod json;
pub mod text;

use crate::source::{SourceId, SourceRecord};
use crate::store::Accessor;
use crate::FathomResult;
use std::path::Path;

/// Output format for a characterization report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Structured JSON (machine-readable).
    Json,
    /// Human-readable indented tree.
    Text,
}

/// Render the subtree rooted at `root` to a string.
pub fn render_report(
    store: &dyn Accessor,
    root: SourceId,
    format: ReportFormat,
) -> FathomResult<String> {
    match format {
        ReportFormat::Json => json::render(store, root),
        ReportFormat::Text => text::render(store, root),
    }
}

/// Render and write the report to `output`.
pub fn write_report(
    store: &dyn Accessor,
    root: SourceId,
    format: ReportFormat,
    output: &Path,
) -> FathomResult<()> {
    let content = render_report(store, root, format)?;
    std::fs::write(output, content)?;
    Ok(())
}

// ─── Property Descriptors ──────────────────────────────────────────

/// Statically declared reporting descriptor: ordered name/accessor pairs
/// per reportable field, with no runtime type inspection.
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub fetch: fn(&SourceRecord) -> Option<String>,
}

/// Report-ordered descriptors for a source node.
pub static SOURCE_DESCRIPTORS: &[PropertyDescriptor] = &[
    PropertyDescriptor {
        name: "kind",
        description: "what kind of object this source is",
        fetch: |record| Some(record.kind.label().to_string()),
    },
    PropertyDescriptor {
        name: "name",
        description: "display name of the source",
        fetch: |record| Some(record.kind.display_name()),
    },
    PropertyDescriptor {
        name: "format",
        description: "most trusted format identification",
        fetch: |record| record.best_format().map(|fi| fi.dispatch_target().to_string()),
    },
    PropertyDescriptor {
        name: "confidence",
        description: "confidence of the most trusted identification",
        fetch: |record| record.best_format().map(|fi| fi.confidence.to_string()),
    },
    PropertyDescriptor {
        name: "children",
        description: "number of child sources",
        fetch: |record| {
            if record.children.is_empty() {
                None
            } else {
                Some(record.children.len().to_string())
            }
        },
    },
    PropertyDescriptor {
        name: "elapsed-ms",
        description: "wall-clock characterization time",
        fetch: |record| record.timer.duration_ms().map(|ms| ms.to_string()),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identify::{Confidence, FormatId, FormatIdentification};
    use crate::source::{SourceKind, SourceRecord};
    use crate::store::MemoryStore;

    fn sample_tree() -> (MemoryStore, SourceId) {
        let mut store = MemoryStore::new();
        let root = store
            .persist_source(SourceRecord::new(SourceKind::Directory { path: "/data".into() }))
            .unwrap();
        let child = store
            .persist_source(SourceRecord::new(SourceKind::File { path: "/data/a.wav".into() }))
            .unwrap();
        store.add_child(root, child).unwrap();
        store
            .add_presumptive_format(
                child,
                FormatIdentification::new(FormatId::native("riff"), Confidence::PositiveSpecific)
                    .with_canonical(FormatId::native("wave")),
            )
            .unwrap();
        (store, root)
    }

    #[test]
    fn test_descriptor_order_is_stable() {
        let names: Vec<&str> = SOURCE_DESCRIPTORS.iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["kind", "name", "format", "confidence", "children", "elapsed-ms"]
        );
    }

    #[test]
    fn test_json_report_contains_tree() {
        let (store, root) = sample_tree();
        let rendered = render_report(&store, root, ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["root"]["kind"], "directory");
        assert_eq!(value["root"]["children"][0]["name"], "a.wav");
        assert_eq!(
            value["root"]["children"][0]["formats"][0]["canonical"],
            "fathom:format/wave"
        );
    }

    #[test]
    fn test_text_report_mentions_sources() {
        let (store, root) = sample_tree();
        let rendered = render_report(&store, root, ReportFormat::Text).unwrap();
        assert!(rendered.contains("directory"));
        assert!(rendered.contains("a.wav"));
        assert!(rendered.contains("fathom:format/wave"));
    }
}
