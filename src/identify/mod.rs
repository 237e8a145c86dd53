//! Format identification model — candidate matches with confidence ranking
//!
//! A [`FormatIdentification`] is one handler's claim about a source's
//! format: the id the handler reported, the engine-canonical id it maps to
//! (when known), a confidence level, and the producing handler. The type
//! carries a strict total order used both to pick the best candidate among
//! several identifications of the same source and to keep report output
//! deterministic.

pub mod signatures;

use crate::source::Message;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

// ─── Format Identifier ─────────────────────────────────────────────

/// Namespace-qualified format identifier, e.g. `fathom:format/wave`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatId(String);

impl FormatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Shorthand for ids in the engine's own namespace:
    /// `FormatId::native("wave")` → `fathom:format/wave`.
    pub fn native(name: &str) -> Self {
        Self(format!("fathom:format/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Confidence Ranking ────────────────────────────────────────────

/// How much an identification is to be trusted, most-trusted first.
///
/// Variants are declared in rank order so the derived `Ord` agrees with
/// [`Confidence::rank`]: lower rank = more confident.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Confidence {
    /// The format was positively validated against its specification.
    Validated,
    /// A specific match, e.g. magic bytes plus an internal structure probe.
    PositiveSpecific,
    /// A generic match, e.g. magic bytes for a container family.
    PositiveGeneric,
    /// An educated guess from content sniffing.
    Heuristic,
    /// A weak hint, e.g. a file extension alone.
    Tentative,
    /// The source was checked and is known NOT to be this format.
    Negative,
}

impl Confidence {
    /// Numeric sort rank; lower is more confident.
    pub fn rank(self) -> u8 {
        match self {
            Confidence::Validated => 1,
            Confidence::PositiveSpecific => 2,
            Confidence::PositiveGeneric => 3,
            Confidence::Heuristic => 4,
            Confidence::Tentative => 5,
            Confidence::Negative => 6,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::Validated => "Validated",
            Confidence::PositiveSpecific => "PositiveSpecific",
            Confidence::PositiveGeneric => "PositiveGeneric",
            Confidence::Heuristic => "Heuristic",
            Confidence::Tentative => "Tentative",
            Confidence::Negative => "Negative",
        };
        f.write_str(label)
    }
}

// ─── Format Identification ─────────────────────────────────────────

/// One candidate format match attached to a source.
///
/// Equality, ordering, and hashing ignore `messages`: two identifications
/// are the same claim iff `reported`, `canonical`, `product`, and
/// `confidence` all match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatIdentification {
    /// Format id as returned by the producing handler.
    pub reported: FormatId,
    /// Engine-canonical id, when the producer could map the match to one.
    pub canonical: Option<FormatId>,
    pub confidence: Confidence,
    /// Id of the handler/tool that produced this match.
    pub product: Option<String>,
    /// Informational only; excluded from equality and ordering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

impl FormatIdentification {
    pub fn new(reported: FormatId, confidence: Confidence) -> Self {
        Self {
            reported,
            canonical: None,
            confidence,
            product: None,
            messages: Vec::new(),
        }
    }

    pub fn with_canonical(mut self, canonical: FormatId) -> Self {
        self.canonical = Some(canonical);
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// The id dispatch should resolve: the canonical id when present,
    /// otherwise the reported one.
    pub fn dispatch_target(&self) -> &FormatId {
        self.canonical.as_ref().unwrap_or(&self.reported)
    }

    /// Order `Option`al identifications with "no identification" as the
    /// maximum element, so the best candidate is always the minimum.
    pub fn compare_optional(
        a: Option<&FormatIdentification>,
        b: Option<&FormatIdentification>,
    ) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialEq for FormatIdentification {
    fn eq(&self, other: &Self) -> bool {
        self.reported == other.reported
            && self.canonical == other.canonical
            && self.product == other.product
            && self.confidence == other.confidence
    }
}

impl Eq for FormatIdentification {}

impl Hash for FormatIdentification {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reported.hash(state);
        self.canonical.hash(state);
        self.product.hash(state);
        self.confidence.rank().hash(state);
    }
}

impl Ord for FormatIdentification {
    /// Strict total order over `(reported, canonical, product, confidence
    /// rank)`, each field compared in that priority order. `Option` fields
    /// sort `None` before any `Some`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.reported
            .cmp(&other.reported)
            .then_with(|| self.canonical.cmp(&other.canonical))
            .then_with(|| self.product.cmp(&other.product))
            .then_with(|| self.confidence.rank().cmp(&other.confidence.rank()))
    }
}

impl PartialOrd for FormatIdentification {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FormatIdentification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.dispatch_target(), self.confidence)
    }
}

/// A deduplicated, deterministically ordered set of identifications.
pub type IdentificationSet = BTreeSet<FormatIdentification>;
