//! RIFF chunk prober — parse and validate RIFF-family streams (WAVE, AVI,
//! WebP)
//!
//! Every RIFF stream is self-describing: a 12-byte header (`RIFF`,
//! declared size, form type) followed by chunks that each carry their own
//! 8-byte header. The prober walks the chunk chain without decoding chunk
//! payloads, records what it finds as source properties, and validates
//! the structural rules for the forms it knows.

use crate::characterize::Characterizer;
use crate::dispatch::{Capabilities, Coverage, FormatHandler, ModuleMeta, SourceInput, Validity};
use crate::source::{Message, Property, SourceId, SourceKind};
use crate::store::Accessor;
use crate::FathomResult;
use std::io::{self, Read, Seek, SeekFrom};

const RIFF_HEADER_LEN: u64 = 12;
const CHUNK_HEADER_LEN: u64 = 8;

/// Structural summary of one RIFF stream.
#[derive(Debug)]
struct RiffLayout {
    declared_size: u32,
    form: [u8; 4],
    /// Chunk ids in stream order.
    chunks: Vec<[u8; 4]>,
    /// Total bytes the walk consumed.
    consumed: u64,
}

impl RiffLayout {
    fn form_str(&self) -> String {
        String::from_utf8_lossy(&self.form).trim_end().to_string()
    }

    fn has_chunk(&self, id: &[u8; 4]) -> bool {
        self.chunks.contains(id)
    }
}

#[derive(Debug, Default)]
pub struct RiffHandler;

impl RiffHandler {
    pub fn new() -> Self {
        Self
    }

    /// Walk the header and chunk chain. Truncated input fails with an
    /// I/O-kind error; a stream that is not RIFF at all returns `None`.
    fn read_layout(input: &mut SourceInput) -> FathomResult<Option<RiffLayout>> {
        let total = input.size().unwrap_or(0);
        let Some(reader) = input.reader() else {
            return Ok(None);
        };

        let mut header = [0u8; RIFF_HEADER_LEN as usize];
        reader.read_exact(&mut header)?;
        if &header[0..4] != b"RIFF" {
            return Ok(None);
        }
        let declared_size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let form = [header[8], header[9], header[10], header[11]];

        let mut chunks = Vec::new();
        let mut position = RIFF_HEADER_LEN;
        loop {
            let mut chunk_header = [0u8; CHUNK_HEADER_LEN as usize];
            match read_fill(reader, &mut chunk_header)? {
                0 => break,
                n if n < chunk_header.len() => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated RIFF chunk header",
                    )
                    .into());
                }
                _ => {}
            }
            let id = [chunk_header[0], chunk_header[1], chunk_header[2], chunk_header[3]];
            let size = u32::from_le_bytes([
                chunk_header[4],
                chunk_header[5],
                chunk_header[6],
                chunk_header[7],
            ]) as u64;
            // Chunk payloads are padded to even length.
            let skip = size + (size & 1);
            position += CHUNK_HEADER_LEN + skip;
            if position > total {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "RIFF chunk '{}' declares {} bytes but the stream ends early",
                        String::from_utf8_lossy(&id),
                        size
                    ),
                )
                .into());
            }
            reader.seek(SeekFrom::Current(skip as i64))?;
            chunks.push(id);
        }

        Ok(Some(RiffLayout {
            declared_size,
            form,
            chunks,
            consumed: position,
        }))
    }
}

/// Read until `buf` is full or EOF, returning bytes read.
fn read_fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl FormatHandler for RiffHandler {
    fn meta(&self) -> ModuleMeta {
        ModuleMeta::new("fathom/riff-handler", env!("CARGO_PKG_VERSION"))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::parser_validator()
    }

    fn accepts(&self, kind: &SourceKind) -> bool {
        kind.byte_path().is_some()
    }

    fn parse(
        &self,
        _chr: &Characterizer,
        store: &mut dyn Accessor,
        source: SourceId,
        input: &mut SourceInput,
    ) -> FathomResult<u64> {
        let Some(layout) = Self::read_layout(input)? else {
            store.add_message(source, Message::error("stream does not start with a RIFF header"))?;
            return Ok(0);
        };

        store.add_property(source, Property::new("riff.chunk.id", "RIFF"))?;
        store.add_property(
            source,
            Property::new("riff.declared.size", layout.declared_size.to_string()),
        )?;
        store.add_property(source, Property::new("riff.form.type", layout.form_str()))?;
        let chunk_list: Vec<String> = layout
            .chunks
            .iter()
            .map(|id| String::from_utf8_lossy(id).trim_end().to_string())
            .collect();
        store.add_property(source, Property::new("riff.chunks", chunk_list.join(",")))?;

        Ok(layout.consumed)
    }

    fn validate(
        &self,
        _chr: &Characterizer,
        store: &mut dyn Accessor,
        source: SourceId,
        input: &mut SourceInput,
    ) -> FathomResult<Validity> {
        let Some(layout) = Self::read_layout(input)? else {
            return Ok(Validity::False);
        };

        match &layout.form {
            b"WAVE" => {
                // A well-formed WAVE stream carries at least fmt and data.
                if layout.has_chunk(b"fmt ") && layout.has_chunk(b"data") {
                    Ok(Validity::True)
                } else {
                    store.add_message(
                        source,
                        Message::warning("WAVE stream is missing a fmt or data chunk"),
                    )?;
                    Ok(Validity::False)
                }
            }
            b"AVI " | b"WEBP" => {
                if layout.chunks.is_empty() {
                    Ok(Validity::False)
                } else {
                    Ok(Validity::True)
                }
            }
            _ => Ok(Validity::Undetermined),
        }
    }

    fn coverage(&self) -> Coverage {
        Coverage::Selective
    }
}

#[cfg(test)]
pub(crate) fn wave_bytes() -> Vec<u8> {
    // RIFF header + minimal PCM fmt chunk + 4-byte data chunk.
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes()); // PCM
    fmt.extend_from_slice(&1u16.to_le_bytes()); // mono
    fmt.extend_from_slice(&8000u32.to_le_bytes()); // sample rate
    fmt.extend_from_slice(&16000u32.to_le_bytes()); // byte rate
    fmt.extend_from_slice(&2u16.to_le_bytes()); // block align
    fmt.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    let data = [0u8, 1, 2, 3];
    let riff_size = 4 + (8 + fmt.len()) + (8 + data.len());

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(riff_size as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&fmt);
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&data);
    bytes
}
