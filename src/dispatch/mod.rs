//! Capability-based dispatcher
//!
//! Handlers declare up front which steps they support — identify, parse,
//! validate, digest — via a [`Capabilities`] descriptor bound at
//! registration. The dispatcher branches on that declaration, never on
//! live type tests, and invokes exactly the declared subset. Invoking an
//! undeclared step is a programming error, not a runtime fallback.

use crate::characterize::Characterizer;
use crate::identify::{FormatId, FormatIdentification, IdentificationSet};
use crate::source::{Message, ModuleRecord, SourceId, SourceKind, SourceRecord};
use crate::store::Accessor;
use crate::FathomResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::time::Instant;

// ─── Validation Outcomes ───────────────────────────────────────────

/// A validation verdict is data, never an error: "the object is invalid"
/// is an expected, reportable outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    True,
    False,
    Undetermined,
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::True => f.write_str("valid"),
            Validity::False => f.write_str("invalid"),
            Validity::Undetermined => f.write_str("undetermined"),
        }
    }
}

/// How much of its format's specification a validator checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coverage {
    /// The validator checks the full specification.
    Inclusive,
    /// The validator checks a selected subset.
    Selective,
}

// ─── Capability Descriptor ─────────────────────────────────────────

/// Declared step support, attached to every handler at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub identify: bool,
    pub parse: bool,
    pub validate: bool,
    pub digest: bool,
}

impl Capabilities {
    pub fn identifier() -> Self {
        Self { identify: true, ..Self::default() }
    }

    pub fn parser() -> Self {
        Self { parse: true, ..Self::default() }
    }

    pub fn parser_validator() -> Self {
        Self { parse: true, validate: true, ..Self::default() }
    }

    pub fn digester() -> Self {
        Self { digest: true, ..Self::default() }
    }
}

// ─── Handler Metadata ──────────────────────────────────────────────

/// Static descriptive metadata a handler contributes to its provenance
/// record.
#[derive(Debug, Clone, Copy)]
pub struct ModuleMeta {
    pub name: &'static str,
    pub version: &'static str,
    pub release_date: Option<&'static str>,
    pub rights: Option<&'static str>,
    /// Descriptor of an externally wrapped tool, when the handler shells
    /// out instead of parsing natively.
    pub wrapped_tool: Option<&'static str>,
}

impl ModuleMeta {
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        Self {
            name,
            version,
            release_date: None,
            rights: None,
            wrapped_tool: None,
        }
    }

    pub fn to_record(&self) -> ModuleRecord {
        let mut record = ModuleRecord::new(self.name, self.version);
        record.release_date = self.release_date.map(String::from);
        record.rights = self.rights.map(String::from);
        record.wrapped_tool = self.wrapped_tool.map(String::from);
        record
    }
}

// ─── Source Input ──────────────────────────────────────────────────

/// Scoped I/O handle for one handler invocation. Opened by the dispatcher
/// right before the handler runs and dropped on every exit path, so a
/// source never retains an open descriptor past its characterization.
pub struct SourceInput {
    reader: Option<BufReader<File>>,
    size: Option<u64>,
}

impl SourceInput {
    /// Open the source's byte stream, if it has one. Sources without local
    /// bytes (directories, file sets, clumps, embedded sub-objects) get an
    /// empty input.
    pub fn open(record: &SourceRecord, buffer_capacity: usize) -> FathomResult<Self> {
        match record.kind.byte_path() {
            Some(path) => {
                let file = File::open(path)?;
                let size = file.metadata()?.len();
                Ok(Self {
                    reader: Some(BufReader::with_capacity(buffer_capacity, file)),
                    size: Some(size),
                })
            }
            None => Ok(Self::empty()),
        }
    }

    pub fn empty() -> Self {
        Self { reader: None, size: None }
    }

    pub fn reader(&mut self) -> Option<&mut BufReader<File>> {
        self.reader.as_mut()
    }

    /// Total byte length of the underlying stream, when known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn rewind(&mut self) -> FathomResult<()> {
        if let Some(reader) = &mut self.reader {
            reader.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    /// Read up to `n` head bytes, leaving the stream rewound.
    pub fn read_head(&mut self, n: usize) -> FathomResult<Vec<u8>> {
        let mut head = Vec::new();
        if let Some(reader) = &mut self.reader {
            reader.seek(SeekFrom::Start(0))?;
            reader.take(n as u64).read_to_end(&mut head)?;
            reader.seek(SeekFrom::Start(0))?;
        }
        Ok(head)
    }
}

// ─── Handler Contract ──────────────────────────────────────────────

/// A bound processor for a format. Default step bodies panic: the
/// dispatcher only ever invokes steps the handler's [`Capabilities`]
/// declare, so reaching a default body is a programming error.
pub trait FormatHandler {
    fn meta(&self) -> ModuleMeta;

    fn capabilities(&self) -> Capabilities;

    /// Whether this handler targets the given source kind. Identification
    /// is only invoked on kinds the handler accepts.
    fn accepts(&self, _kind: &SourceKind) -> bool {
        true
    }

    fn identify(
        &self,
        _chr: &Characterizer,
        _store: &mut dyn Accessor,
        _source: SourceId,
        _input: &mut SourceInput,
    ) -> FathomResult<IdentificationSet> {
        panic!("handler '{}' does not declare the identify capability", self.meta().name)
    }

    /// Parse the source, returning the number of bytes consumed. Truncated
    /// or unreadable input fails with an I/O-kind error.
    fn parse(
        &self,
        _chr: &Characterizer,
        _store: &mut dyn Accessor,
        _source: SourceId,
        _input: &mut SourceInput,
    ) -> FathomResult<u64> {
        panic!("handler '{}' does not declare the parse capability", self.meta().name)
    }

    fn validate(
        &self,
        _chr: &Characterizer,
        _store: &mut dyn Accessor,
        _source: SourceId,
        _input: &mut SourceInput,
    ) -> FathomResult<Validity> {
        panic!("handler '{}' does not declare the validate capability", self.meta().name)
    }

    /// How much of the specification [`FormatHandler::validate`] covers.
    fn coverage(&self) -> Coverage {
        Coverage::Inclusive
    }

    fn digest(
        &self,
        _chr: &Characterizer,
        _store: &mut dyn Accessor,
        _source: SourceId,
        _input: &mut SourceInput,
    ) -> FathomResult<()> {
        panic!("handler '{}' does not declare the digest capability", self.meta().name)
    }

    /// Refinement/profile handlers chained after a successful validate
    /// step (e.g. a broadcast-WAVE profile after the RIFF validator).
    fn profiles(&self) -> Vec<Box<dyn FormatHandler>> {
        Vec::new()
    }
}

// ─── Aggregator Contract ───────────────────────────────────────────

/// One recognized grouping of sibling sources.
#[derive(Debug, Clone)]
pub struct ClumpMatch {
    pub identification: FormatIdentification,
    /// Children of the probed aggregate that form the group.
    pub members: Vec<SourceId>,
}

/// Detects clumps: sets of existing sibling sources that collectively
/// form one logical formatted object.
pub trait Aggregator {
    fn meta(&self) -> ModuleMeta;

    fn identify(&self, store: &dyn Accessor, source: SourceId) -> FathomResult<Vec<ClumpMatch>>;
}

// ─── Handler Registry ──────────────────────────────────────────────

pub type HandlerFactory = Box<dyn Fn() -> Box<dyn FormatHandler>>;

/// Builder for the identifier→handler table. Registration happens once,
/// explicitly, at startup; the built registry is read-only.
#[derive(Default)]
pub struct RegistryBuilder {
    table: HashMap<FormatId, HandlerFactory>,
}

impl RegistryBuilder {
    pub fn register(
        mut self,
        format: FormatId,
        factory: impl Fn() -> Box<dyn FormatHandler> + 'static,
    ) -> Self {
        self.table.insert(format, Box::new(factory));
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry { table: self.table }
    }
}

/// Read-only format-identifier → handler-factory table.
#[derive(Default)]
pub struct HandlerRegistry {
    table: HashMap<FormatId, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Instantiate the handler bound to `format`, if any.
    pub fn resolve(&self, format: &FormatId) -> Option<Box<dyn FormatHandler>> {
        self.table.get(format).map(|factory| factory())
    }

    pub fn contains(&self, format: &FormatId) -> bool {
        self.table.contains_key(format)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Registered format ids, sorted for deterministic listings.
    pub fn formats(&self) -> Vec<&FormatId> {
        let mut ids: Vec<&FormatId> = self.table.keys().collect();
        ids.sort();
        ids
    }
}

// ─── Dispatch Operations ───────────────────────────────────────────

/// Resolve `format` in the registry and durably dispatch the source to the
/// bound handler. An unbound format is reported on the source and skipped;
/// the pipeline continues (`Ok(false)`).
pub fn dispatch_format(
    chr: &Characterizer,
    store: &mut dyn Accessor,
    source: SourceId,
    format: &FormatId,
) -> FathomResult<bool> {
    match chr.registry().resolve(format) {
        Some(handler) => {
            dispatch_handler(chr, store, source, handler.as_ref(), true)?;
            Ok(true)
        }
        None => {
            tracing::warn!("no handler bound for format '{}' on {}", format, source);
            store.add_message(
                source,
                Message::warning(format!("no handler bound for format '{format}'")),
            )?;
            Ok(false)
        }
    }
}

/// Invoke the declared capability subset of `handler` against `source`.
///
/// `attach = true` records the handler's provenance (with timing and any
/// validation verdict) on the source; `attach = false` is a speculative
/// probe that leaves no provenance behind.
pub fn dispatch_handler(
    chr: &Characterizer,
    store: &mut dyn Accessor,
    source: SourceId,
    handler: &dyn FormatHandler,
    attach: bool,
) -> FathomResult<()> {
    let meta = handler.meta();
    chr.check_deadline(meta.name)?;

    let capabilities = handler.capabilities();
    let record = store.retrieve_source(source)?;
    let mut module = meta.to_record();
    module.timer.start();
    let started = Instant::now();

    let outcome = {
        // Scoped acquisition: the handle is dropped on every exit path.
        let mut input = SourceInput::open(&record, chr.config().buffer_size)?;
        invoke_steps(chr, store, source, handler, capabilities, &record.kind, &mut input, attach)
    };

    module.timer.end();
    let elapsed_ms = started.elapsed().as_millis();
    match &outcome {
        Ok(validity) => {
            module.validity = *validity;
            tracing::debug!("✓ {} on {} in {}ms", meta.name, source, elapsed_ms);
        }
        Err(err) => {
            tracing::warn!("✗ {} on {} failed after {}ms: {}", meta.name, source, elapsed_ms, err);
        }
    }
    if attach {
        store.add_module(source, module)?;
    }
    outcome.map(|_| ())
}

#[allow(clippy::too_many_arguments)]
fn invoke_steps(
    chr: &Characterizer,
    store: &mut dyn Accessor,
    source: SourceId,
    handler: &dyn FormatHandler,
    capabilities: Capabilities,
    kind: &SourceKind,
    input: &mut SourceInput,
    attach: bool,
) -> FathomResult<Option<Validity>> {
    if capabilities.identify && handler.accepts(kind) {
        let identifications = handler.identify(chr, store, source, input)?;
        store.add_presumptive_formats(source, identifications.into_iter().collect())?;
    }
    if capabilities.parse {
        input.rewind()?;
        let consumed = handler.parse(chr, store, source, input)?;
        tracing::trace!("{} consumed {} bytes of {}", handler.meta().name, consumed, source);
    }
    let mut validity = None;
    if capabilities.validate {
        input.rewind()?;
        validity = Some(handler.validate(chr, store, source, input)?);
        for profile in handler.profiles() {
            dispatch_handler(chr, store, source, profile.as_ref(), attach)?;
        }
    }
    if capabilities.digest {
        input.rewind()?;
        handler.digest(chr, store, source, input)?;
    }
    Ok(validity)
}
