//! OFAC SDN (Specially Designated Nationals) list adapter.
//!
//! Parses the US Treasury SDN XML: one `sdnEntry` per listed party, with
//! `sdnType` deciding the entity type, `aka` elements carrying aliases,
//! and `id` elements carrying identity documents.

use async_trait::async_trait;
use tracing::warn;

use crate::adapter::{ParseOutcome, SourceAdapter};
use crate::error::{FetchError, ParseError};
use crate::models::{EntityType, IdentifierKind, RawRecord};
use crate::transport::Transport;
use crate::xml::Element;

pub struct OfacAdapter {
    location: String,
}

impl OfacAdapter {
    pub fn new(location: String) -> Self {
        Self { location }
    }
}

#[async_trait]
impl SourceAdapter for OfacAdapter {
    fn name(&self) -> &str {
        "ofac"
    }

    fn description(&self) -> &str {
        "US Treasury OFAC SDN list (XML)"
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Vec<u8>, FetchError> {
        transport.get(&self.location).await
    }

    fn parse(&self, payload: &[u8]) -> Result<ParseOutcome, ParseError> {
        let root = Element::parse(payload)?;
        let entries = root.descendants("sdnEntry");
        if entries.is_empty() {
            return Err(ParseError::Shape("no sdnEntry elements".into()));
        }

        let mut outcome = ParseOutcome::default();
        for entry in entries {
            match parse_entry(entry) {
                Some(record) => outcome.records.push(record),
                None => {
                    outcome.skipped += 1;
                    warn!(source = "ofac", "skipping malformed sdnEntry");
                }
            }
        }
        Ok(outcome)
    }
}

fn parse_entry(entry: &Element) -> Option<RawRecord> {
    let uid = entry
        .attr("uid")
        .map(str::to_string)
        .or_else(|| entry.child_text("uid").map(str::to_string))?;

    let primary = primary_name(entry)?;
    let mut names = vec![primary];
    for aka in entry.descendants("aka") {
        let alias = join_name_parts(&[aka.child_text("firstName"), aka.child_text("lastName")]);
        if let Some(alias) = alias {
            if !names.contains(&alias) {
                names.push(alias);
            }
        }
    }

    let entity_type = match entry.child_text("sdnType").map(str::to_lowercase).as_deref() {
        Some(t) if t.contains("individual") => EntityType::Person,
        Some(t) if t.contains("entity") => EntityType::Organization,
        Some(t) if t.contains("vessel") => EntityType::Vessel,
        Some(t) if t.contains("aircraft") => EntityType::Aircraft,
        // The SDN schema omits sdnType for some legacy rows; a birth date
        // is a reliable person signal.
        _ if !entry.descendants("dateOfBirth").is_empty() => EntityType::Person,
        _ => EntityType::Unknown,
    };

    let mut addresses = Vec::new();
    for addr in entry.descendants("address") {
        let parts: Vec<&str> = [
            addr.child_text("address1"),
            addr.child_text("address2"),
            addr.child_text("city"),
            addr.child_text("stateOrProvince"),
            addr.child_text("postalCode"),
            addr.child_text("country"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !parts.is_empty() {
            addresses.push(parts.join(", "));
        }
    }

    let mut identifiers = Vec::new();
    for id in entry.descendants("id") {
        if let Some(number) = id.child_text("idNumber") {
            let kind = map_id_type(id.child_text("idType"));
            identifiers.push((kind, number.to_string()));
        }
    }

    let dates = entry
        .descendants("dateOfBirth")
        .iter()
        .filter(|d| !d.text.trim().is_empty())
        .map(|d| d.text.trim().to_string())
        .collect();

    let programs = entry
        .descendants("program")
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| p.text.trim().to_string())
        .collect();

    Some(RawRecord {
        source: "ofac".to_string(),
        source_id: uid,
        names,
        entity_type,
        addresses,
        identifiers,
        dates,
        programs,
        nationality: entry.descendants("nationality").first().and_then(|n| {
            let t = n.text.trim();
            (!t.is_empty()).then(|| t.to_string())
        }),
    })
}

fn primary_name(entry: &Element) -> Option<String> {
    // Individuals carry firstName/lastName at the entry level; entities,
    // vessels and aircraft use title or lastName alone.
    join_name_parts(&[entry.child_text("firstName"), entry.child_text("lastName")])
        .or_else(|| entry.child_text("title").map(str::to_string))
}

fn join_name_parts(parts: &[Option<&str>]) -> Option<String> {
    let joined = parts
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    let joined = joined.trim().to_string();
    (!joined.is_empty()).then_some(joined)
}

fn map_id_type(raw: Option<&str>) -> IdentifierKind {
    let Some(raw) = raw else {
        return IdentifierKind::Other;
    };
    let lower = raw.to_lowercase();
    if lower.contains("passport") {
        IdentifierKind::Passport
    } else if lower.contains("tax") {
        IdentifierKind::TaxId
    } else if lower.contains("registration") {
        IdentifierKind::Registration
    } else if lower.contains("imo") {
        IdentifierKind::ImoNumber
    } else {
        IdentifierKind::Other
    }
}
