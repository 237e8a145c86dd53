//! Input resolution — names in, root source out
//!
//! Classifies each top-level input (local path or URL), materializes a
//! source for it, and groups multiple inputs under a synthetic file-set
//! root. URL inputs are fetched into a per-run spool directory so the
//! rest of the pipeline only ever reads local bytes.

use crate::source::{SourceId, SourceKind, SourceRecord};
use crate::store::Accessor;
use crate::{FathomError, FathomResult};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Classified top-level input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputKind {
    Path(PathBuf),
    Url(String),
}

/// Classify a raw input name. Purely syntactic; existence is checked when
/// the source is materialized.
pub(crate) fn classify(raw: &str) -> InputKind {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        InputKind::Url(trimmed.to_string())
    } else {
        InputKind::Path(PathBuf::from(trimmed))
    }
}

/// Materialize sources for every input and return the root: the single
/// source itself, or a file-set source holding one child per input.
pub(crate) fn resolve_inputs(
    store: &mut dyn Accessor,
    inputs: &[String],
    spool_dir: &Path,
) -> FathomResult<SourceId> {
    if inputs.len() == 1 {
        return source_for_input(store, &inputs[0], spool_dir);
    }
    let root = store.persist_source(SourceRecord::new(SourceKind::FileSet))?;
    for raw in inputs {
        let child = source_for_input(store, raw, spool_dir)?;
        store.add_child(root, child)?;
    }
    Ok(root)
}

fn source_for_input(
    store: &mut dyn Accessor,
    raw: &str,
    spool_dir: &Path,
) -> FathomResult<SourceId> {
    let kind = match classify(raw) {
        InputKind::Path(path) => {
            let metadata = std::fs::metadata(&path)
                .map_err(|_| FathomError::InputNotFound(path.clone()))?;
            if metadata.is_dir() {
                SourceKind::Directory { path }
            } else {
                SourceKind::File { path }
            }
        }
        InputKind::Url(url) => {
            let spool = fetch_url(&url, spool_dir)?;
            SourceKind::Url { url, spool }
        }
    };
    store.persist_source(SourceRecord::new(kind))
}

/// Fetch a URL into the spool directory, returning the spool file path.
fn fetch_url(url: &str, spool_dir: &Path) -> FathomResult<PathBuf> {
    tracing::info!("fetching {}", url);
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let path = spool_dir.join(spool_file_name(url));
    let bytes = response.bytes()?;
    let mut file = std::fs::File::create(&path)?;
    file.write_all(&bytes)?;
    tracing::debug!("spooled {} bytes from {} to {}", bytes.len(), url, path.display());
    Ok(path)
}

/// Derive a spool file name from the URL's last path segment, keeping the
/// extension so identification hints still apply. Falls back to a unique
/// name when the URL has no usable segment.
fn spool_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query.rsplit('/').next().unwrap_or("");
    let cleaned: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        format!("spool-{}", uuid::Uuid::new_v4())
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("https://example.com/a.wav"),
            InputKind::Url("https://example.com/a.wav".into())
        );
        assert_eq!(
            classify("http://example.com"),
            InputKind::Url("http://example.com".into())
        );
        assert_eq!(classify("./data/a.wav"), InputKind::Path("./data/a.wav".into()));
        assert_eq!(classify("/abs/path"), InputKind::Path("/abs/path".into()));
    }

    #[test]
    fn test_spool_file_name() {
        assert_eq!(spool_file_name("https://example.com/media/track.wav"), "track.wav");
        assert_eq!(spool_file_name("https://example.com/a.wav?sig=abc"), "a.wav");
        assert!(spool_file_name("https://example.com/").starts_with("spool-"));
    }

    #[test]
    fn test_single_input_is_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();

        let mut store = MemoryStore::new();
        let inputs = vec![file.to_string_lossy().into_owned()];
        let root = resolve_inputs(&mut store, &inputs, dir.path()).unwrap();

        let record = store.retrieve_source(root).unwrap();
        assert_eq!(record.parent, None);
        assert!(matches!(record.kind, SourceKind::File { .. }));
    }

    #[test]
    fn test_multiple_inputs_get_file_set_root() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("sub");
        std::fs::write(&a, b"hello").unwrap();
        std::fs::create_dir(&b).unwrap();

        let mut store = MemoryStore::new();
        let inputs = vec![
            a.to_string_lossy().into_owned(),
            b.to_string_lossy().into_owned(),
        ];
        let root = resolve_inputs(&mut store, &inputs, dir.path()).unwrap();

        let record = store.retrieve_source(root).unwrap();
        assert_eq!(record.kind, SourceKind::FileSet);
        assert_eq!(record.children.len(), 2);
        let kinds: Vec<&'static str> = record
            .children
            .iter()
            .map(|&c| store.retrieve_source(c).unwrap().kind.label())
            .collect();
        assert_eq!(kinds, vec!["file", "directory"]);
    }

    #[test]
    fn test_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        let inputs = vec!["/definitely/not/here".to_string()];
        assert!(matches!(
            resolve_inputs(&mut store, &inputs, dir.path()).unwrap_err(),
            FathomError::InputNotFound(_)
        ));
    }
}
