//! EU consolidated financial sanctions list adapter.
//!
//! Parses the EEAS FSF XML: one `sanctionEntity` per listed party with
//! `nameAlias` elements (either a `wholeName` or structured name parts),
//! a `subjectType`, and `identification` / `address` / `birthDate` detail.

use async_trait::async_trait;
use tracing::warn;

use crate::adapter::{ParseOutcome, SourceAdapter};
use crate::error::{FetchError, ParseError};
use crate::models::{EntityType, IdentifierKind, RawRecord};
use crate::transport::Transport;
use crate::xml::Element;

pub struct EuAdapter {
    location: String,
}

impl EuAdapter {
    pub fn new(location: String) -> Self {
        Self { location }
    }
}

#[async_trait]
impl SourceAdapter for EuAdapter {
    fn name(&self) -> &str {
        "eu"
    }

    fn description(&self) -> &str {
        "EU consolidated financial sanctions list (XML)"
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Vec<u8>, FetchError> {
        transport.get(&self.location).await
    }

    fn parse(&self, payload: &[u8]) -> Result<ParseOutcome, ParseError> {
        let root = Element::parse(payload)?;
        let entities = root.descendants("sanctionEntity");
        if entities.is_empty() {
            return Err(ParseError::Shape("no sanctionEntity elements".into()));
        }

        let mut outcome = ParseOutcome::default();
        for entity in entities {
            match parse_entity(entity) {
                Some(record) => outcome.records.push(record),
                None => {
                    outcome.skipped += 1;
                    warn!(source = "eu", "skipping malformed sanctionEntity");
                }
            }
        }
        Ok(outcome)
    }
}

fn parse_entity(entity: &Element) -> Option<RawRecord> {
    let unit_id = entity
        .attr("logicalId")
        .map(str::to_string)
        .or_else(|| entity.child_text("unitId").map(str::to_string))
        .or_else(|| entity.child_text("logicalId").map(str::to_string))?;

    let mut names = Vec::new();
    for alias in entity.descendants("nameAlias") {
        let name = alias
            .child_text("wholeName")
            .map(str::to_string)
            .or_else(|| alias.attr("wholeName").map(str::to_string))
            .or_else(|| {
                let parts: Vec<&str> = [
                    alias.child_text("firstName"),
                    alias.child_text("middleName"),
                    alias.child_text("lastName"),
                ]
                .into_iter()
                .flatten()
                .collect();
                (!parts.is_empty()).then(|| parts.join(" "))
            });
        if let Some(name) = name {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    if names.is_empty() {
        return None;
    }

    let subject_type = entity
        .child_text("subjectType")
        .map(str::to_string)
        .or_else(|| {
            entity
                .child("subjectType")
                .and_then(|s| s.attr("code"))
                .map(str::to_string)
        })
        .unwrap_or_default()
        .to_lowercase();
    let entity_type = if subject_type.contains("person") || subject_type.contains("individual") {
        EntityType::Person
    } else if subject_type.contains("enterprise") || subject_type.contains("entity") {
        EntityType::Organization
    } else if !entity.descendants("birthDate").is_empty() {
        EntityType::Person
    } else {
        EntityType::Unknown
    };

    let mut addresses = Vec::new();
    for addr in entity.descendants("address") {
        let parts: Vec<&str> = [
            addr.child_text("street"),
            addr.child_text("city"),
            addr.child_text("country"),
            addr.child_text("countryDescription"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !parts.is_empty() {
            addresses.push(parts.join(", "));
        }
    }

    let mut identifiers = Vec::new();
    for ident in entity.descendants("identification") {
        if let Some(number) = ident
            .child_text("number")
            .or_else(|| ident.child_text("latinNumber"))
        {
            let kind = map_identification_type(
                ident
                    .child_text("identificationTypeCode")
                    .or_else(|| ident.child_text("identificationTypeDescription")),
            );
            identifiers.push((kind, number.to_string()));
        }
    }

    let mut dates = Vec::new();
    for birth in entity.descendants("birthDate") {
        if let Some(date) = birth
            .child_text("birthDate")
            .or_else(|| birth.child_text("year"))
        {
            dates.push(date.to_string());
        } else if !birth.text.trim().is_empty() {
            dates.push(birth.text.trim().to_string());
        }
    }

    let programs = entity
        .descendants("regulation")
        .iter()
        .filter_map(|r| r.child_text("programme").or_else(|| r.attr("programme")))
        .map(|p| format!("EU {}", p))
        .collect();

    Some(RawRecord {
        source: "eu".to_string(),
        source_id: unit_id,
        names,
        entity_type,
        addresses,
        identifiers,
        dates,
        programs,
        nationality: entity
            .descendants("citizenship")
            .first()
            .and_then(|c| c.child_text("countryDescription").or_else(|| c.child_text("country")))
            .map(str::to_string),
    })
}

fn map_identification_type(raw: Option<&str>) -> IdentifierKind {
    let Some(raw) = raw else {
        return IdentifierKind::Other;
    };
    let lower = raw.to_lowercase();
    if lower.contains("passport") {
        IdentifierKind::Passport
    } else if lower.contains("tax") || lower.contains("fiscal") {
        IdentifierKind::TaxId
    } else if lower.contains("reg") {
        IdentifierKind::Registration
    } else if lower.contains("imo") {
        IdentifierKind::ImoNumber
    } else {
        IdentifierKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<export>
  <sanctionEntity logicalId="13">
    <subjectType>person</subjectType>
    <nameAlias><wholeName>John A. Smith</wholeName></nameAlias>
    <nameAlias><firstName>Jon</firstName><lastName>Smyth</lastName></nameAlias>
    <address><city>Minsk</city><countryDescription>Belarus</countryDescription></address>
    <identification>
      <identificationTypeCode>passport</identificationTypeCode>
      <number>AB-123456</number>
    </identification>
    <birthDate><birthDate>1975-06-14</birthDate></birthDate>
    <regulation programme="BLR"/>
  </sanctionEntity>
  <sanctionEntity logicalId="14">
    <subjectType>enterprise</subjectType>
    <nameAlias><wholeName>ACME TRADING GMBH</wholeName></nameAlias>
  </sanctionEntity>
</export>"#;

    #[test]
    fn test_parse_sample() {
        let adapter = EuAdapter::new("fsf.xml".into());
        let outcome = adapter.parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(outcome.records.len(), 2);

        let person = &outcome.records[0];
        assert_eq!(person.source_id, "13");
        assert_eq!(person.names, vec!["John A. Smith", "Jon Smyth"]);
        assert_eq!(person.entity_type, EntityType::Person);
        assert_eq!(
            person.identifiers,
            vec![(IdentifierKind::Passport, "AB-123456".to_string())]
        );
        assert_eq!(person.programs, vec!["EU BLR"]);

        let org = &outcome.records[1];
        assert_eq!(org.entity_type, EntityType::Organization);
    }

    #[test]
    fn test_nameless_entity_skipped() {
        let payload = r#"<export>
  <sanctionEntity logicalId="1"><subjectType>person</subjectType></sanctionEntity>
  <sanctionEntity logicalId="2"><nameAlias><wholeName>Kept</wholeName></nameAlias></sanctionEntity>
</export>"#;
        let adapter = EuAdapter::new("fsf.xml".into());
        let outcome = adapter.parse(payload.as_bytes()).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }
}
