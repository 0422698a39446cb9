//! Core data models used throughout SanctionsWatch.
//!
//! These types represent the records, entities, and profiles that flow
//! through the fetch → normalize → match → registry pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of real-world subject a record describes.
///
/// Polymorphic only in which optional fields tend to be populated
/// (birth dates for people, IMO numbers for vessels), never in behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Person,
    Organization,
    Vessel,
    Aircraft,
    Unknown,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "person",
            EntityType::Organization => "organization",
            EntityType::Vessel => "vessel",
            EntityType::Aircraft => "aircraft",
            EntityType::Unknown => "unknown",
        }
    }
}

/// Identifier scheme tag. Source-native labels ("Passport", "IMO number",
/// "Company registration") are mapped into this set by each adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierKind {
    Passport,
    TaxId,
    Registration,
    ImoNumber,
    Other,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Passport => "passport",
            IdentifierKind::TaxId => "tax-id",
            IdentifierKind::Registration => "registration",
            IdentifierKind::ImoNumber => "imo-number",
            IdentifierKind::Other => "other",
        }
    }
}

/// Raw record produced by a source adapter before normalization.
/// Immutable once produced; the normalizer never mutates it.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Source label, e.g. "ofac".
    pub source: String,
    /// Source-native identifier (SDN uid, UN dataid, OFSI GroupID).
    pub source_id: String,
    /// Raw name strings, first entry is the primary name.
    pub names: Vec<String>,
    pub entity_type: EntityType,
    /// Raw address lines as published by the source.
    pub addresses: Vec<String>,
    /// (source-native kind label mapped to our scheme, raw value).
    pub identifiers: Vec<(IdentifierKind, String)>,
    /// Raw date strings (birth or registration).
    pub dates: Vec<String>,
    /// Sanction program / regime labels.
    pub programs: Vec<String>,
    /// Free-text nationality, when the source publishes one.
    pub nationality: Option<String>,
}

/// Precision of a normalized calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatePrecision {
    Full,
    YearMonth,
    Year,
    Unknown,
}

/// A date with a precision tag. Unparseable source dates become
/// `{ date: None, precision: Unknown }`, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedDate {
    pub date: Option<NaiveDate>,
    pub precision: DatePrecision,
}

impl TaggedDate {
    pub fn unknown() -> Self {
        Self {
            date: None,
            precision: DatePrecision::Unknown,
        }
    }
}

/// Normalized address tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    pub country: Option<String>,
    pub locality: Option<String>,
    /// Unresolved portion of the raw line, kept verbatim.
    pub remainder: String,
}

/// The normalized unit of matching. Every CanonicalEntity traces to
/// exactly one [`RawRecord`]; normalization is pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    /// Stable id, unique per (source, source-native id): `"{source}-{source_id}"`.
    pub id: String,
    /// Normalized primary name.
    pub name: String,
    /// Normalized alternate names, source order preserved.
    pub aliases: Vec<String>,
    pub entity_type: EntityType,
    pub addresses: BTreeSet<Address>,
    /// (kind, normalized value) pairs.
    pub identifiers: BTreeSet<(IdentifierKind, String)>,
    /// Birth date for people, registration date for organizations.
    pub date: TaggedDate,
    pub programs: BTreeSet<String>,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

impl CanonicalEntity {
    /// Countries this entity is associated with, from addresses.
    pub fn countries(&self) -> BTreeSet<&str> {
        self.addresses
            .iter()
            .filter_map(|a| a.country.as_deref())
            .collect()
    }
}

/// A candidate link that scored inside the review band: recorded on the
/// profile, never silently merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFlag {
    /// Entity inside this profile.
    pub entity_id: String,
    /// Candidate entity in some other profile.
    pub candidate_id: String,
    pub score: f64,
}

/// Identifier-kind disagreement discovered during a merge. Does not block
/// the merge; the distinction is kept visible instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictAnnotation {
    pub kind: IdentifierKind,
    pub values: Vec<String>,
}

/// Field-wise merged view of a profile's members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalView {
    /// Name from the earliest-seen highest-priority source.
    pub name: String,
    pub aliases: Vec<String>,
    pub entity_type: EntityType,
    pub addresses: BTreeSet<Address>,
    pub identifiers: BTreeSet<(IdentifierKind, String)>,
    pub date: TaggedDate,
    pub programs: BTreeSet<String>,
    /// Sources that contributed members.
    pub sources: BTreeSet<String>,
    /// Most recent member timestamp.
    pub last_updated: DateTime<Utc>,
}

/// The registry's unit of truth: a set of [`CanonicalEntity`] members
/// believed to denote one real-world entity. Membership is
/// transitive-closed under the auto-merge relation; profiles never overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityProfile {
    pub id: String,
    pub members: Vec<CanonicalEntity>,
    pub view: CanonicalView,
    pub review_flags: Vec<ReviewFlag>,
    pub conflicts: Vec<ConflictAnnotation>,
}

impl EntityProfile {
    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Terminal status of one source after the orchestrator is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceStatus {
    /// All records parsed.
    Success,
    /// Records produced, but some were skipped during parse.
    PartialFailure,
    /// Zero records after retries exhausted (or run timeout).
    Failed,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Success => "success",
            SourceStatus::PartialFailure => "partial-failure",
            SourceStatus::Failed => "failed",
        }
    }
}

/// Per-source result at the orchestrator boundary. Errors never propagate
/// past this type; the pipeline proceeds with whatever succeeded.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub records: Vec<RawRecord>,
    pub status: SourceStatus,
    /// Malformed records skipped during parse.
    pub parse_failures: u64,
    /// Fetch attempts made, including retries.
    pub attempts: u32,
    /// Summary of the terminal error, for Failed/PartialFailure.
    pub error: Option<String>,
}

/// One row of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub status: SourceStatus,
    pub records: u64,
    pub parse_failures: u64,
    pub attempts: u32,
    pub error: Option<String>,
}

/// Full run report: always produced, even under partial failure.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub entities: u64,
    pub profiles: u64,
    pub auto_merges: u64,
    pub review_flags: u64,
    pub conflicts: u64,
}

impl RunReport {
    /// True when at least one source produced records.
    pub fn any_succeeded(&self) -> bool {
        self.sources
            .iter()
            .any(|s| s.status != SourceStatus::Failed)
    }
}
