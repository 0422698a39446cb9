//! UK HM Treasury (OFSI) consolidated list adapter.
//!
//! The OFSI list is delimited text: one row per listing with up to six
//! name columns (`Name1`..`Name6`, first non-empty is primary) and six
//! address columns. Rows sharing a `GroupID` are distinct listings of the
//! same group entry and arrive as separate records here; cross-row
//! reconciliation is the matcher's job.

use async_trait::async_trait;
use tracing::warn;

use crate::adapter::{payload_str, ParseOutcome, SourceAdapter};
use crate::error::{FetchError, ParseError};
use crate::models::{EntityType, IdentifierKind, RawRecord};
use crate::transport::Transport;

pub struct UkAdapter {
    location: String,
}

impl UkAdapter {
    pub fn new(location: String) -> Self {
        Self { location }
    }
}

#[async_trait]
impl SourceAdapter for UkAdapter {
    fn name(&self) -> &str {
        "uk"
    }

    fn description(&self) -> &str {
        "UK HM Treasury OFSI consolidated list (CSV)"
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Vec<u8>, FetchError> {
        transport.get(&self.location).await
    }

    fn parse(&self, payload: &[u8]) -> Result<ParseOutcome, ParseError> {
        let text = payload_str(payload)?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| ParseError::Csv(e.to_string()))?
            .clone();
        if !headers.iter().any(|h| h == "GroupID") {
            return Err(ParseError::Shape("missing GroupID column".into()));
        }

        let mut outcome = ParseOutcome::default();
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(_) => {
                    outcome.skipped += 1;
                    warn!(source = "uk", "skipping undecodable CSV row");
                    continue;
                }
            };
            match parse_row(&headers, &row) {
                Some(record) => outcome.records.push(record),
                None => {
                    outcome.skipped += 1;
                    warn!(source = "uk", "skipping malformed CSV row");
                }
            }
        }
        Ok(outcome)
    }
}

/// Non-empty, trimmed value of a named column.
fn field<'r>(
    headers: &csv::StringRecord,
    row: &'r csv::StringRecord,
    name: &str,
) -> Option<&'r str> {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_row(headers: &csv::StringRecord, row: &csv::StringRecord) -> Option<RawRecord> {
    let get = |name: &str| field(headers, row, name);
    let group_id = get("GroupID")?;

    let names: Vec<String> = ["Name1", "Name2", "Name3", "Name4", "Name5", "Name6"]
        .iter()
        .filter_map(|col| get(col))
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return None;
    }

    let group_type = get("GroupType").unwrap_or_default().to_lowercase();
    let entity_type = if group_type.contains("individual") {
        EntityType::Person
    } else if group_type.contains("entity") || group_type.contains("organisation") {
        EntityType::Organization
    } else if group_type.contains("ship") || group_type.contains("vessel") {
        EntityType::Vessel
    } else if get("DOB").is_some() {
        EntityType::Person
    } else {
        EntityType::Unknown
    };

    let mut address_parts: Vec<&str> = [
        "Address1", "Address2", "Address3", "Address4", "Address5", "Address6",
    ]
    .iter()
    .filter_map(|col| get(col))
    .collect();
    if let Some(country) = get("Country") {
        if !address_parts.contains(&country) {
            address_parts.push(country);
        }
    }
    let addresses = if address_parts.is_empty() {
        Vec::new()
    } else {
        vec![address_parts.join(", ")]
    };

    let mut identifiers = Vec::new();
    if let Some(passport) = get("PassportDetails") {
        // The column is free text; the first token of document-number
        // length is the number itself.
        if let Some(number) = passport.split_whitespace().find(|t| t.len() >= 6) {
            identifiers.push((IdentifierKind::Passport, number.to_string()));
        }
    }
    if let Some(national_id) = get("NationalIdentificationNumber") {
        identifiers.push((IdentifierKind::Other, national_id.to_string()));
    }

    let dates = get("DOB")
        .map(|d| vec![d.replace("00/00/", "01/01/")])
        .unwrap_or_default();

    let programs = get("Regime")
        .map(|r| vec![r.to_string()])
        .unwrap_or_default();

    Some(RawRecord {
        source: "uk".to_string(),
        source_id: group_id.to_string(),
        names,
        entity_type,
        addresses,
        identifiers,
        dates,
        programs,
        nationality: get("CountryOfBirth").map(str::to_string),
    })
}
