//! Shapefile clump detection
//!
//! An ESRI shapefile is not one file but a sibling family sharing a stem:
//! `abc.shp` plus companions like `abc.dbf`, `abc.shx`, `abc.prj`. The
//! aggregator probes an aggregate source's existing children and reports
//! each such family as one logical object, which the characterizer then
//! re-parents under a Clump. Extension evidence alone keeps the
//! identification Tentative.

use crate::dispatch::{Aggregator, ClumpMatch, ModuleMeta};
use crate::identify::{Confidence, FormatId, FormatIdentification};
use crate::source::{SourceId, SourceKind};
use crate::store::Accessor;
use crate::FathomResult;
use std::collections::BTreeMap;

const PRODUCT: &str = "fathom/shapefile-aggregator";

/// Companion extensions that travel with a `.shp` main file.
const COMPANION_EXTENSIONS: &[&str] = &["dbf", "shx", "prj", "sbn", "sbx", "cpg"];

#[derive(Debug, Default)]
pub struct ShapefileAggregator;

impl ShapefileAggregator {
    pub fn new() -> Self {
        Self
    }
}

impl Aggregator for ShapefileAggregator {
    fn meta(&self) -> ModuleMeta {
        ModuleMeta::new(PRODUCT, env!("CARGO_PKG_VERSION"))
    }

    fn identify(&self, store: &dyn Accessor, source: SourceId) -> FathomResult<Vec<ClumpMatch>> {
        let record = store.retrieve_source(source)?;

        // Group file children by stem, preserving child order per group.
        let mut families: BTreeMap<String, Vec<(SourceId, String)>> = BTreeMap::new();
        for &child in &record.children {
            let child_record = store.retrieve_source(child)?;
            let SourceKind::File { path } = &child_record.kind else {
                continue;
            };
            let (Some(stem), Some(extension)) = (
                path.file_stem().map(|s| s.to_string_lossy().to_lowercase()),
                path.extension().map(|e| e.to_string_lossy().to_lowercase()),
            ) else {
                continue;
            };
            if extension == "shp" || COMPANION_EXTENSIONS.contains(&extension.as_str()) {
                families.entry(stem).or_default().push((child, extension));
            }
        }

        let mut matches = Vec::new();
        for (stem, members) in families {
            let has_main = members.iter().any(|(_, ext)| ext == "shp");
            if !has_main || members.len() < 2 {
                continue;
            }
            tracing::debug!(
                "shapefile family '{}' with {} member(s) under {}",
                stem,
                members.len(),
                source
            );
            matches.push(ClumpMatch {
                identification: FormatIdentification::new(
                    FormatId::native("esri-shapefile"),
                    Confidence::Tentative,
                )
                .with_canonical(FormatId::native("esri-shapefile"))
                .with_product(PRODUCT),
                members: members.into_iter().map(|(id, _)| id).collect(),
            });
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceRecord;
    use crate::store::MemoryStore;

    fn add_file(store: &mut MemoryStore, parent: SourceId, name: &str) -> SourceId {
        let child = store
            .persist_source(SourceRecord::new(SourceKind::File {
                path: format!("/data/{name}").into(),
            }))
            .unwrap();
        store.add_child(parent, child).unwrap();
        child
    }

    #[test]
    fn test_family_is_matched_once() {
        let mut store = MemoryStore::new();
        let dir = store
            .persist_source(SourceRecord::new(SourceKind::Directory { path: "/data".into() }))
            .unwrap();
        let shp = add_file(&mut store, dir, "abc.shp");
        let dbf = add_file(&mut store, dir, "abc.dbf");
        let prj = add_file(&mut store, dir, "abc.prj");
        add_file(&mut store, dir, "notes.txt");

        let matches = ShapefileAggregator::new().identify(&store, dir).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].members, vec![shp, dbf, prj]);
        assert_eq!(matches[0].identification.confidence, Confidence::Tentative);
        assert_eq!(
            matches[0].identification.reported,
            FormatId::native("esri-shapefile")
        );
    }

    #[test]
    fn test_lone_shp_is_not_a_clump() {
        let mut store = MemoryStore::new();
        let dir = store
            .persist_source(SourceRecord::new(SourceKind::Directory { path: "/data".into() }))
            .unwrap();
        add_file(&mut store, dir, "solo.shp");
        add_file(&mut store, dir, "other.txt");

        assert!(ShapefileAggregator::new().identify(&store, dir).unwrap().is_empty());
    }

    #[test]
    fn test_companions_without_main_are_ignored() {
        let mut store = MemoryStore::new();
        let dir = store
            .persist_source(SourceRecord::new(SourceKind::Directory { path: "/data".into() }))
            .unwrap();
        add_file(&mut store, dir, "abc.dbf");
        add_file(&mut store, dir, "abc.prj");

        assert!(ShapefileAggregator::new().identify(&store, dir).unwrap().is_empty());
    }

    #[test]
    fn test_distinct_stems_form_distinct_families() {
        let mut store = MemoryStore::new();
        let dir = store
            .persist_source(SourceRecord::new(SourceKind::Directory { path: "/data".into() }))
            .unwrap();
        add_file(&mut store, dir, "a.shp");
        add_file(&mut store, dir, "a.dbf");
        add_file(&mut store, dir, "b.shp");
        add_file(&mut store, dir, "b.shx");

        let matches = ShapefileAggregator::new().identify(&store, dir).unwrap();
        assert_eq!(matches.len(), 2);
    }
}
