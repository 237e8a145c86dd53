//! Content digester — SHA-256 and CRC32 checksums as provenance
//!
//! One streaming pass feeds both hashers; the results land on the source
//! as `digest.sha256` and `digest.crc32` properties alongside the
//! digester's module record.

use crate::characterize::Characterizer;
use crate::dispatch::{Capabilities, FormatHandler, ModuleMeta, SourceInput};
use crate::source::{Property, SourceId, SourceKind};
use crate::store::Accessor;
use crate::FathomResult;
use sha2::{Digest, Sha256};
use std::io::Read;

#[derive(Debug, Default)]
pub struct ContentDigester;

impl ContentDigester {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for ContentDigester {
    fn meta(&self) -> ModuleMeta {
        ModuleMeta::new("fathom/digester", env!("CARGO_PKG_VERSION"))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::digester()
    }

    fn accepts(&self, kind: &SourceKind) -> bool {
        kind.byte_path().is_some()
    }

    fn digest(
        &self,
        _chr: &Characterizer,
        store: &mut dyn Accessor,
        source: SourceId,
        input: &mut SourceInput,
    ) -> FathomResult<()> {
        let Some(reader) = input.reader() else {
            return Ok(());
        };

        let mut sha256 = Sha256::new();
        let mut crc32 = crc32fast::Hasher::new();
        let mut buffer = [0u8; 8192];
        let mut total: u64 = 0;
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            sha256.update(&buffer[..n]);
            crc32.update(&buffer[..n]);
            total += n as u64;
        }

        store.add_property(source, Property::new("digest.sha256", hex::encode(sha256.finalize())))?;
        store.add_property(
            source,
            Property::new("digest.crc32", format!("{:08x}", crc32.finalize())),
        )?;
        tracing::debug!("digested {} bytes of {}", total, source);
        Ok(())
    }
}
