//! UN Security Council consolidated sanctions list adapter.
//!
//! The UN XML splits listings into `INDIVIDUAL` and `ENTITY` elements.
//! Individual names arrive as numbered parts (`FIRST_NAME`..`FOURTH_NAME`);
//! aliases live in `INDIVIDUAL_ALIAS` / `ENTITY_ALIAS` elements.

use async_trait::async_trait;
use tracing::warn;

use crate::adapter::{ParseOutcome, SourceAdapter};
use crate::error::{FetchError, ParseError};
use crate::models::{EntityType, IdentifierKind, RawRecord};
use crate::transport::Transport;
use crate::xml::Element;

pub struct UnAdapter {
    location: String,
}

impl UnAdapter {
    pub fn new(location: String) -> Self {
        Self { location }
    }
}

#[async_trait]
impl SourceAdapter for UnAdapter {
    fn name(&self) -> &str {
        "un"
    }

    fn description(&self) -> &str {
        "UN Security Council consolidated list (XML)"
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Vec<u8>, FetchError> {
        transport.get(&self.location).await
    }

    fn parse(&self, payload: &[u8]) -> Result<ParseOutcome, ParseError> {
        let root = Element::parse(payload)?;
        let individuals = root.descendants("INDIVIDUAL");
        let entities = root.descendants("ENTITY");
        if individuals.is_empty() && entities.is_empty() {
            return Err(ParseError::Shape("no INDIVIDUAL or ENTITY elements".into()));
        }

        let mut outcome = ParseOutcome::default();
        for (elem, entity_type) in individuals
            .into_iter()
            .map(|e| (e, EntityType::Person))
            .chain(entities.into_iter().map(|e| (e, EntityType::Organization)))
        {
            match parse_listing(elem, entity_type) {
                Some(record) => outcome.records.push(record),
                None => {
                    outcome.skipped += 1;
                    warn!(source = "un", "skipping malformed listing");
                }
            }
        }
        Ok(outcome)
    }
}

fn parse_listing(elem: &Element, entity_type: EntityType) -> Option<RawRecord> {
    let dataid = elem
        .attr("dataid")
        .map(str::to_string)
        .or_else(|| elem.child_text("DATAID").map(str::to_string))
        .or_else(|| elem.child_text("REFERENCE_NUMBER").map(str::to_string))?;

    let primary = primary_name(elem)?;
    let mut names = vec![primary];
    for alias in elem
        .descendants("INDIVIDUAL_ALIAS")
        .into_iter()
        .chain(elem.descendants("ENTITY_ALIAS"))
    {
        if let Some(name) = alias.child_text("ALIAS_NAME") {
            let name = name.to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let mut addresses = Vec::new();
    for addr in elem
        .descendants("INDIVIDUAL_ADDRESS")
        .into_iter()
        .chain(elem.descendants("ENTITY_ADDRESS"))
    {
        let parts: Vec<&str> = [
            addr.child_text("STREET"),
            addr.child_text("CITY"),
            addr.child_text("STATE_PROVINCE"),
            addr.child_text("COUNTRY"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !parts.is_empty() {
            addresses.push(parts.join(", "));
        }
    }

    let mut identifiers = Vec::new();
    for doc in elem
        .descendants("INDIVIDUAL_DOCUMENT")
        .into_iter()
        .chain(elem.descendants("ENTITY_DOCUMENT"))
    {
        if let Some(number) = doc.child_text("NUMBER") {
            let kind = map_document_type(doc.child_text("TYPE_OF_DOCUMENT"));
            identifiers.push((kind, number.to_string()));
        }
    }

    let mut dates = Vec::new();
    for dob in elem.descendants("INDIVIDUAL_DATE_OF_BIRTH") {
        // Either an exact DATE or a YEAR alone.
        if let Some(date) = dob.child_text("DATE").or_else(|| dob.child_text("YEAR")) {
            dates.push(date.to_string());
        } else if !dob.text.trim().is_empty() {
            dates.push(dob.text.trim().to_string());
        }
    }

    let programs = elem
        .descendants("UN_LIST_TYPE")
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| format!("UN {}", p.text.trim()))
        .collect();

    Some(RawRecord {
        source: "un".to_string(),
        source_id: dataid,
        names,
        entity_type,
        addresses,
        identifiers,
        dates,
        programs,
        nationality: elem.descendants("NATIONALITY").first().and_then(|n| {
            let value = n.child_text("VALUE").unwrap_or(n.text.trim());
            (!value.is_empty()).then(|| value.to_string())
        }),
    })
}

fn primary_name(elem: &Element) -> Option<String> {
    let parts: Vec<&str> = [
        elem.child_text("FIRST_NAME"),
        elem.child_text("SECOND_NAME"),
        elem.child_text("THIRD_NAME"),
        elem.child_text("FOURTH_NAME"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !parts.is_empty() {
        return Some(parts.join(" "));
    }
    elem.child_text("ENTITY_NAME").map(str::to_string)
}

fn map_document_type(raw: Option<&str>) -> IdentifierKind {
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
