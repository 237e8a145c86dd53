//! Built-in format identifier — magic bytes, extension hints, text sniff
//!
//! Confidence reflects the evidence: a magic match refined by internal
//! structure (e.g. a RIFF form type) is PositiveSpecific, a bare magic
//! match is whatever the signature table says, a content sniff is
//! Heuristic, and an extension alone is only ever Tentative.

use crate::characterize::Characterizer;
use crate::dispatch::{Capabilities, FormatHandler, ModuleMeta, SourceInput};
use crate::identify::signatures;
use crate::identify::{Confidence, FormatId, FormatIdentification, IdentificationSet};
use crate::source::{SourceId, SourceKind};
use crate::store::Accessor;
use crate::FathomResult;

const PRODUCT: &str = "fathom/identifier";

/// How many head bytes the signature tables need; covers the `ustar`
/// probe at offset 257.
const HEAD_LEN: usize = 512;

#[derive(Debug, Default)]
pub struct FormatIdentifier;

impl FormatIdentifier {
    pub fn new() -> Self {
        Self
    }

    fn identification(name: &str, confidence: Confidence) -> FormatIdentification {
        let id = FormatId::native(name);
        FormatIdentification::new(id.clone(), confidence)
            .with_canonical(id)
            .with_product(PRODUCT)
    }

    /// Identify a byte-bearing source from its head bytes and name.
    fn sniff(
        &self,
        input: &mut SourceInput,
        extension: Option<&str>,
    ) -> FathomResult<IdentificationSet> {
        let mut set = IdentificationSet::new();
        let head = input.read_head(HEAD_LEN)?;

        for signature in signatures::match_magic(&head) {
            if signature.format == "riff" {
                match signatures::riff_form(&head) {
                    Some(form) => {
                        set.insert(
                            FormatIdentification::new(
                                FormatId::native("riff"),
                                Confidence::PositiveSpecific,
                            )
                            .with_canonical(FormatId::native(form))
                            .with_product(PRODUCT),
                        );
                    }
                    None => {
                        set.insert(Self::identification("riff", signature.confidence));
                    }
                }
            } else {
                set.insert(Self::identification(signature.format, signature.confidence));
            }
        }

        if set.is_empty() && signatures::looks_textual(&head) {
            set.insert(Self::identification("utf8", Confidence::Heuristic));
        }

        if let Some(ext) = extension {
            if let Some(format) = signatures::match_extension(ext) {
                set.insert(Self::identification(format, Confidence::Tentative));
            }
        }

        Ok(set)
    }
}

fn extension_of(kind: &SourceKind) -> Option<String> {
    let name = match kind {
        SourceKind::File { path } => path.file_name()?.to_string_lossy().into_owned(),
        SourceKind::Url { url, .. } => {
            let without_query = url.split(['?', '#']).next().unwrap_or(url);
            without_query.rsplit('/').next()?.to_string()
        }
        SourceKind::Embedded { name } => name.clone(),
        _ => return None,
    };
    name.rsplit_once('.').map(|(_, ext)| ext.to_string())
}

impl FormatHandler for FormatIdentifier {
    fn meta(&self) -> ModuleMeta {
        ModuleMeta::new(PRODUCT, env!("CARGO_PKG_VERSION"))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::identifier()
    }

    fn identify(
        &self,
        _chr: &Characterizer,
        store: &mut dyn Accessor,
        source: SourceId,
        input: &mut SourceInput,
    ) -> FathomResult<IdentificationSet> {
        let record = store.retrieve_source(source)?;
        let mut set = IdentificationSet::new();
        match &record.kind {
            SourceKind::Directory { .. } => {
                set.insert(Self::identification("directory", Confidence::PositiveSpecific));
            }
            SourceKind::FileSet => {
                set.insert(Self::identification("file-set", Confidence::PositiveSpecific));
            }
            // Clump formats come from the aggregator that formed them.
            SourceKind::Clump => {}
            SourceKind::File { .. } | SourceKind::Url { .. } | SourceKind::Embedded { .. } => {
                set = self.sniff(input, extension_of(&record.kind).as_deref())?;
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characterize::{Characterizer, FathomConfig};
    use crate::source::SourceRecord;
    use crate::store::MemoryStore;
    use std::io::Write;

    fn identify_file(bytes: &[u8], name: &str) -> IdentificationSet {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        drop(file);

        let chr = Characterizer::builder().config(FathomConfig::default()).build();
        let mut store = MemoryStore::new();
        let source = store
            .persist_source(SourceRecord::new(SourceKind::File { path: path.clone() }))
            .unwrap();
        let record = store.retrieve_source(source).unwrap();
        let mut input = SourceInput::open(&record, 8192).unwrap();
        FormatIdentifier::new()
            .identify(&chr, &mut store, source, &mut input)
            .unwrap()
    }

    #[test]
    fn test_wave_magic_beats_extension() {
        let set = identify_file(b"RIFF\x24\x00\x00\x00WAVEfmt ", "sound.wav");
        let best = set.iter().next().unwrap();
        assert_eq!(best.reported, FormatId::native("riff"));
        assert_eq!(best.canonical, Some(FormatId::native("wave")));
        assert_eq!(best.confidence, Confidence::PositiveSpecific);
        // The .wav extension also contributes a Tentative claim.
        assert!(set
            .iter()
            .any(|fi| fi.reported == FormatId::native("wave")
                && fi.confidence == Confidence::Tentative));
    }

    #[test]
    fn test_plain_text_is_heuristic() {
        let set = identify_file(b"just some notes\n", "notes.txt");
        assert!(set
            .iter()
            .any(|fi| fi.reported == FormatId::native("utf8")
                && fi.confidence == Confidence::Heuristic));
    }

    #[test]
    fn test_unknown_binary_yields_nothing() {
        let set = identify_file(&[0x00, 0x01, 0x02, 0x03], "blob.xyz");
        assert!(set.is_empty());
    }

    #[test]
    fn test_directory_kind_is_positive() {
        let chr = Characterizer::builder().build();
        let mut store = MemoryStore::new();
        let source = store
            .persist_source(SourceRecord::new(SourceKind::Directory { path: "/d".into() }))
            .unwrap();
        let mut input = SourceInput::empty();
        let set = FormatIdentifier::new()
            .identify(&chr, &mut store, source, &mut input)
            .unwrap();
        let best = set.iter().next().unwrap();
        assert_eq!(best.canonical, Some(FormatId::native("directory")));
        assert_eq!(best.confidence, Confidence::PositiveSpecific);
    }
}
