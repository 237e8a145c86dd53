//! Characterization orchestration
//!
//! [`Characterizer::characterize`] drives the per-source pipeline:
//!
//! 1. **Identify** — dispatch the configured identifier (absent = skipped,
//!    non-fatal) to collect presumptive format identifications.
//! 2. **Dispatch by format** — resolve each identification's canonical id
//!    and dispatch the bound format handler (parse + validate).
//! 3. **Aggregate probe** — for aggregate sources, run the configured
//!    aggregator speculatively over the children; re-parent each matched
//!    group under a fresh Clump and dispatch the Clump by its format.
//! 4. **Digest** — for non-aggregate sources, when the digest switch is on
//!    and a digester is configured.
//! 5. **Recursion** — container-walking handlers (directory, file set)
//!    call back into `characterize` for each child they discover, making
//!    the overall walk depth-first.
//!
//! The pipeline is single-threaded and synchronous. I/O failures abort
//! exactly one source subtree: container handlers catch per-child errors,
//! record them, and count them against the fail-fast limit.

mod input;

use crate::dispatch::{self, Aggregator, FormatHandler, HandlerRegistry};
use crate::source::{Message, SourceId};
use crate::store::Accessor;
use crate::{FathomError, FathomResult};
use std::cell::Cell;
use std::time::{Duration, Instant};

// ─── Configuration ─────────────────────────────────────────────────

/// Run-wide options.
#[derive(Debug, Clone)]
pub struct FathomConfig {
    /// I/O buffer capacity for source input streams.
    pub buffer_size: usize,
    /// Global switch: compute content digests for non-aggregate sources.
    pub compute_digests: bool,
    /// Maximum tolerated source failures before the run aborts; `None`
    /// tolerates any number.
    pub fail_fast: Option<usize>,
    /// Cooperative run deadline. The dispatcher refuses to start a handler
    /// step once the deadline has passed, failing that source only.
    pub deadline: Option<Duration>,
}

impl Default for FathomConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            compute_digests: false,
            fail_fast: None,
            deadline: None,
        }
    }
}

// ─── Builder ───────────────────────────────────────────────────────

type HandlerFactory = Box<dyn Fn() -> Box<dyn FormatHandler>>;

/// Explicit startup wiring for a [`Characterizer`]: registry, identifier,
/// digester, and aggregator slots are all bound here, before the first
/// dispatch, and are immutable afterwards.
#[derive(Default)]
pub struct CharacterizerBuilder {
    config: FathomConfig,
    registry: HandlerRegistry,
    identifier: Option<HandlerFactory>,
    digester: Option<HandlerFactory>,
    aggregator: Option<Box<dyn Aggregator>>,
}

impl CharacterizerBuilder {
    pub fn config(mut self, config: FathomConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn identifier(
        mut self,
        factory: impl Fn() -> Box<dyn FormatHandler> + 'static,
    ) -> Self {
        self.identifier = Some(Box::new(factory));
        self
    }

    pub fn digester(
        mut self,
        factory: impl Fn() -> Box<dyn FormatHandler> + 'static,
    ) -> Self {
        self.digester = Some(Box::new(factory));
        self
    }

    pub fn aggregator(mut self, aggregator: Box<dyn Aggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn build(self) -> Characterizer {
        Characterizer {
            config: self.config,
            registry: self.registry,
            identifier: self.identifier,
            digester: self.digester,
            aggregator: self.aggregator,
            failures: Cell::new(0),
            started: Cell::new(None),
        }
    }
}

// ─── Characterizer ─────────────────────────────────────────────────

/// The orchestration engine. Construct through [`Characterizer::builder`]
/// or [`Characterizer::with_builtins`].
pub struct Characterizer {
    config: FathomConfig,
    registry: HandlerRegistry,
    identifier: Option<HandlerFactory>,
    digester: Option<HandlerFactory>,
    aggregator: Option<Box<dyn Aggregator>>,
    failures: Cell<usize>,
    started: Cell<Option<Instant>>,
}

impl Characterizer {
    pub fn builder() -> CharacterizerBuilder {
        CharacterizerBuilder::default()
    }

    /// A characterizer wired with every built-in collaborator: the
    /// magic/extension identifier, the directory and file-set walkers, the
    /// RIFF prober, the shapefile aggregator, and the content digester.
    pub fn with_builtins(config: FathomConfig) -> Self {
        Self::builder()
            .config(config)
            .registry(crate::handlers::builtin_registry())
            .identifier(|| Box::new(crate::handlers::identifier::FormatIdentifier::new()))
            .digester(|| Box::new(crate::handlers::digest::ContentDigester::new()))
            .aggregator(Box::new(crate::handlers::shapefile::ShapefileAggregator::new()))
            .build()
    }

    pub fn config(&self) -> &FathomConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Failed sources recorded so far in this run.
    pub fn failure_count(&self) -> usize {
        self.failures.get()
    }

    // ── Entry point ────────────────────────────────────────────────

    /// Characterize a batch of named inputs (paths and URLs). A single
    /// input becomes the root source; several inputs are grouped under a
    /// synthetic file-set root. URL inputs are fetched into spool files
    /// that live for the duration of the call. Returns the root id.
    pub fn characterize_all(
        &self,
        store: &mut dyn Accessor,
        inputs: &[String],
    ) -> FathomResult<SourceId> {
        self.mark_started();
        let spool = tempfile::tempdir()?;
        let root = input::resolve_inputs(store, inputs, spool.path())?;
        tracing::info!("characterizing {} input(s), root {}", inputs.len(), root);
        self.characterize(store, root)?;
        Ok(root)
    }

    // ── The orchestration algorithm ────────────────────────────────

    /// Characterize one source (and, through handler recursion, its
    /// subtree). The source's timer brackets the work on every exit path.
    pub fn characterize(&self, store: &mut dyn Accessor, source: SourceId) -> FathomResult<()> {
        self.mark_started();
        store.start_timer(source)?;
        let outcome = self.characterize_steps(store, source);
        store.end_timer(source)?;
        outcome
    }

    fn characterize_steps(&self, store: &mut dyn Accessor, source: SourceId) -> FathomResult<()> {
        // Step 1: identify.
        match &self.identifier {
            Some(factory) => {
                let identifier = factory();
                dispatch::dispatch_handler(self, store, source, identifier.as_ref(), true)?;
            }
            None => {
                tracing::debug!("no identifier configured; skipping identification of {}", source);
            }
        }

        // Step 2: dispatch each presumptive identification to its format
        // handler. Several identifications may resolve to the same
        // canonical format; that handler runs once.
        let identifications: Vec<_> = store
            .retrieve_source(source)?
            .formats
            .iter()
            .cloned()
            .collect();
        let mut dispatched = std::collections::BTreeSet::new();
        for identification in &identifications {
            let target = identification.dispatch_target();
            if !dispatched.insert(target.clone()) {
                continue;
            }
            dispatch::dispatch_format(self, store, source, target)?;
        }

        let record = store.retrieve_source(source)?;

        // Step 3: aggregate probe — clump detection over the children.
        if record.is_aggregate() {
            if let Some(aggregator) = &self.aggregator {
                self.check_deadline(aggregator.meta().name)?;
                let mut probe_module = aggregator.meta().to_record();
                probe_module.timer.start();
                let matches = aggregator.identify(&*store, source)?;
                probe_module.timer.end();
                for clump_match in matches {
                    let clump = store.form_clump(source, &clump_match.members)?;
                    tracing::info!(
                        "formed clump {} ({} members) under {}",
                        clump,
                        clump_match.members.len(),
                        source
                    );
                    store.start_timer(clump)?;
                    store.add_module(clump, probe_module.clone())?;
                    store.add_presumptive_format(clump, clump_match.identification.clone())?;
                    let outcome = dispatch::dispatch_format(
                        self,
                        store,
                        clump,
                        clump_match.identification.dispatch_target(),
                    );
                    store.end_timer(clump)?;
                    outcome?;
                }
            }
        }

        // Step 4: digest (non-aggregate sources only).
        if !record.is_aggregate() && self.config.compute_digests {
            match &self.digester {
                Some(factory) => {
                    let digester = factory();
                    dispatch::dispatch_handler(self, store, source, digester.as_ref(), true)?;
                }
                None => {
                    tracing::debug!("digests requested but no digester configured; skipping {}", source);
                }
            }
        }

        Ok(())
    }

    // ── Failure accounting & deadline ──────────────────────────────

    /// Record that characterizing `failed` died with `error`: attach an
    /// Error message to the source, bump the failure count, and enforce
    /// the fail-fast limit. Called by container handlers after catching a
    /// per-child error so siblings keep processing.
    pub fn note_source_failure(
        &self,
        store: &mut dyn Accessor,
        failed: SourceId,
        error: &FathomError,
    ) -> FathomResult<()> {
        self.failures.set(self.failures.get() + 1);
        tracing::warn!("characterization of {} failed: {}", failed, error);
        store.add_message(failed, Message::error(format!("characterization failed: {error}")))?;
        if let Some(limit) = self.config.fail_fast {
            if self.failures.get() > limit {
                return Err(FathomError::TooManyFailures(self.failures.get()));
            }
        }
        Ok(())
    }

    /// Refuse to start a handler step once the run deadline has passed.
    pub(crate) fn check_deadline(&self, step: &str) -> FathomResult<()> {
        if let (Some(deadline), Some(started)) = (self.config.deadline, self.started.get()) {
            if started.elapsed() > deadline {
                return Err(FathomError::DeadlineExceeded { step: step.to_string() });
            }
        }
        Ok(())
    }

    fn mark_started(&self) {
        if self.started.get().is_none() {
            self.started.set(Some(Instant::now()));
        }
    }
}
