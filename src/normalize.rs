//! Pure field normalizers.
//!
//! Every function here is deterministic and idempotent: the same input
//! always yields the same output, and normalizing an already-normalized
//! value is a no-op. Nothing consults the network or mutable global state.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;

use crate::models::{Address, CanonicalEntity, DatePrecision, RawRecord, TaggedDate};

/// Honorific tokens stripped from the edges of a name.
const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sir", "gen", "general", "col", "colonel", "maj", "major",
    "capt", "captain", "haji", "hajji", "sheikh", "shaykh",
];

/// Fixed transliteration table: Cyrillic and common Latin diacritics to
/// plain ASCII. Applied per character before case folding.
fn transliterate_char(c: char, out: &mut String) {
    let mapped: &str = match c {
        'а' | 'А' => "a",
        'б' | 'Б' => "b",
        'в' | 'В' => "v",
        'г' | 'Г' => "g",
        'д' | 'Д' => "d",
        'е' | 'Е' | 'э' | 'Э' => "e",
        'ё' | 'Ё' => "yo",
        'ж' | 'Ж' => "zh",
        'з' | 'З' => "z",
        'и' | 'И' | 'й' | 'Й' => "i",
        'к' | 'К' => "k",
        'л' | 'Л' => "l",
        'м' | 'М' => "m",
        'н' | 'Н' => "n",
        'о' | 'О' => "o",
        'п' | 'П' => "p",
        'р' | 'Р' => "r",
        'с' | 'С' => "s",
        'т' | 'Т' => "t",
        'у' | 'У' => "u",
        'ф' | 'Ф' => "f",
        'х' | 'Х' => "kh",
        'ц' | 'Ц' => "ts",
        'ч' | 'Ч' => "ch",
        'ш' | 'Ш' => "sh",
        'щ' | 'Щ' => "shch",
        'ъ' | 'Ъ' | 'ь' | 'Ь' => "",
        'ы' | 'Ы' => "y",
        'ю' | 'Ю' => "yu",
        'я' | 'Я' => "ya",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'ç' | 'Ç' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ñ' | 'Ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ß' => "ss",
        other => {
            out.push(other);
            return;
        }
    };
    out.push_str(mapped);
}

/// Normalize a name: transliterate, case-fold, reorder `"LAST, FIRST"`
/// comma forms, strip honorifics and punctuation, collapse whitespace.
pub fn normalize_name(raw: &str) -> String {
    let mut transliterated = String::with_capacity(raw.len());
    for c in raw.chars() {
        transliterate_char(c, &mut transliterated);
    }
    let lowered = transliterated.to_lowercase();

    // "SMITH, John A" -> "john a smith". Only the first comma is treated
    // as a surname separator; further commas are punctuation.
    let reordered = match lowered.split_once(',') {
        Some((last, rest)) => format!("{} {}", rest.replace(',', " "), last),
        None => lowered,
    };

    let depunctuated: String = reordered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let tokens: Vec<&str> = depunctuated
        .split_whitespace()
        .filter(|t| !HONORIFICS.contains(t))
        .collect();

    tokens.join(" ")
}

/// Countries recognized verbatim (lowercase canonical form).
const COUNTRIES: &[&str] = &[
    "afghanistan",
    "algeria",
    "armenia",
    "austria",
    "azerbaijan",
    "bahrain",
    "belgium",
    "cuba",
    "cyprus",
    "egypt",
    "eritrea",
    "ethiopia",
    "france",
    "georgia",
    "germany",
    "india",
    "iraq",
    "israel",
    "italy",
    "japan",
    "jordan",
    "kazakhstan",
    "kenya",
    "kuwait",
    "kyrgyzstan",
    "lebanon",
    "libya",
    "mali",
    "moldova",
    "morocco",
    "netherlands",
    "niger",
    "nigeria",
    "oman",
    "pakistan",
    "panama",
    "poland",
    "qatar",
    "saudi arabia",
    "serbia",
    "somalia",
    "spain",
    "sudan",
    "switzerland",
    "tajikistan",
    "tunisia",
    "turkey",
    "turkmenistan",
    "ukraine",
    "united arab emirates",
    "uzbekistan",
    "venezuela",
    "yemen",
];

/// Resolve a lowercase token against the country alias table.
fn resolve_country(token: &str) -> Option<&'static str> {
    match token {
        "united states" | "usa" | "us" | "united states of america" => Some("united states"),
        "united kingdom" | "uk" | "great britain" | "england" => Some("united kingdom"),
        "russia" | "russian federation" => Some("russia"),
        "iran" | "islamic republic of iran" => Some("iran"),
        "north korea" | "dprk" | "democratic people's republic of korea" => Some("north korea"),
        "syria" | "syrian arab republic" => Some("syria"),
        "china" | "people's republic of china" | "prc" => Some("china"),
        "belarus" | "byelorussia" => Some("belarus"),
        "myanmar" | "burma" => Some("myanmar"),
        _ => COUNTRIES.iter().find(|c| **c == token).copied(),
    }
}

/// Normalize a raw address line into (country, locality, remainder).
///
/// Rule set: split on commas; if the trailing segment resolves against the
/// country table it becomes `country` and the segment before it (if any)
/// becomes `locality`. Anything unresolved stays verbatim in `remainder`.
pub fn normalize_address(raw: &str) -> Address {
    let segments: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return Address {
            country: None,
            locality: None,
            remainder: String::new(),
        };
    }

    let last_lower = segments[segments.len() - 1].to_lowercase();
    if let Some(country) = resolve_country(&last_lower) {
        let locality = if segments.len() >= 2 {
            Some(segments[segments.len() - 2].to_lowercase())
        } else {
            None
        };
        let remainder = if segments.len() >= 3 {
            segments[..segments.len() - 2].join(", ")
        } else {
            String::new()
        };
        return Address {
            country: Some(country.to_string()),
            locality,
            remainder,
        };
    }

    Address {
        country: None,
        locality: None,
        remainder: segments.join(", "),
    }
}

/// Parse a source date string into a [`TaggedDate`].
///
/// Known formats: ISO `%Y-%m-%d`, `%Y-%m`, bare year, `%d %b %Y`,
/// `%d/%m/%Y`, `%m/%d/%Y`, and free-text `circa NNNN` / `c. NNNN`.
/// Unparseable input yields `{ None, Unknown }`, never an error.
pub fn normalize_date(raw: &str) -> TaggedDate {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return TaggedDate::unknown();
    }

    for fmt in ["%Y-%m-%d", "%d %b %Y", "%d/%m/%Y", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return TaggedDate {
                date: Some(date),
                precision: DatePrecision::Full,
            };
        }
    }

    // Year-month: "1975-03"
    if let Some((year, month)) = trimmed.split_once('-') {
        if let (Ok(y), Ok(m)) = (year.parse::<i32>(), month.parse::<u32>()) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, 1) {
                return TaggedDate {
                    date: Some(date),
                    precision: DatePrecision::YearMonth,
                };
            }
        }
    }

    // Bare year or "circa 1975" / "c. 1975" / "approximately 1975".
    let year_text = trimmed
        .to_lowercase()
        .replace("circa", " ")
        .replace("approximately", " ")
        .replace("c.", " ")
        .trim()
        .to_string();
    if let Ok(year) = year_text.parse::<i32>() {
        if (1000..=9999).contains(&year) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1) {
                return TaggedDate {
                    date: Some(date),
                    precision: DatePrecision::Year,
                };
            }
        }
    }

    TaggedDate::unknown()
}

/// Normalize an identifier value: drop separators and whitespace,
/// uppercase alphanumerics. The kind tag is preserved by the caller.
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// Turn one raw record into its canonical entity. Pure: every output
/// field is a function of the record and the supplied timestamp.
pub fn canonicalize(record: &RawRecord, last_updated: DateTime<Utc>) -> CanonicalEntity {
    let mut names = record.names.iter().map(|n| normalize_name(n));
    let name = names.next().unwrap_or_default();
    let mut aliases: Vec<String> = Vec::new();
    for alias in names {
        if !alias.is_empty() && alias != name && !aliases.contains(&alias) {
            aliases.push(alias);
        }
    }

    let mut addresses: BTreeSet<Address> = record
        .addresses
        .iter()
        .map(|a| normalize_address(a))
        .filter(|a| a.country.is_some() || a.locality.is_some() || !a.remainder.is_empty())
        .collect();
    // A bare nationality still pins the entity to a country for matching.
    if let Some(nat) = &record.nationality {
        let from_nationality = normalize_address(nat);
        if from_nationality.country.is_some()
            && !addresses.iter().any(|a| a.country == from_nationality.country)
        {
            addresses.insert(Address {
                country: from_nationality.country,
                locality: None,
                remainder: String::new(),
            });
        }
    }

    let identifiers = record
        .identifiers
        .iter()
        .map(|(kind, value)| (*kind, normalize_identifier(value)))
        .filter(|(_, value)| !value.is_empty())
        .collect();

    // First parseable date wins; an all-garbage list stays Unknown.
    let date = record
        .dates
        .iter()
        .map(|d| normalize_date(d))
        .find(|d| d.date.is_some())
        .unwrap_or_else(TaggedDate::unknown);

    CanonicalEntity {
        id: format!("{}-{}", record.source, record.source_id),
        name,
        aliases,
        entity_type: record.entity_type,
        addresses,
        identifiers,
        date,
        programs: record.programs.iter().map(|p| p.trim().to_string()).collect(),
        source: record.source.clone(),
        last_updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_casefold_and_punctuation() {
        assert_eq!(normalize_name("John A. Smith"), "john a smith");
    }

    #[test]
    fn test_name_comma_reorder() {
        assert_eq!(normalize_name("SMITH, John A"), "john a smith");
    }

    #[test]
    fn test_name_honorifics_stripped() {
        assert_eq!(normalize_name("Gen. Mohammed AL-FULANI"), "mohammed al fulani");
    }

    #[test]
    fn test_name_transliteration() {
        assert_eq!(normalize_name("Пётр Иванов"), "pyotr ivanov");
        assert_eq!(normalize_name("José Müller"), "jose muller");
    }

    #[test]
    fn test_name_idempotent() {
        let once = normalize_name("SMITH, John A.");
        assert_eq!(normalize_name(&once), once);
        let once = normalize_name("Пётр Иванов");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn test_address_country_and_locality() {
        let addr = normalize_address("12 Main Street, Tehran, Iran");
        assert_eq!(addr.country.as_deref(), Some("iran"));
        assert_eq!(addr.locality.as_deref(), Some("tehran"));
        assert_eq!(addr.remainder, "12 Main Street");
    }

    #[test]
    fn test_address_country_alias() {
        let addr = normalize_address("Moscow, Russian Federation");
        assert_eq!(addr.country.as_deref(), Some("russia"));
        assert_eq!(addr.locality.as_deref(), Some("moscow"));
    }

    #[test]
    fn test_address_unresolved_kept_verbatim() {
        let addr = normalize_address("Somewhere unrecognizable");
        assert_eq!(addr.country, None);
        assert_eq!(addr.remainder, "Somewhere unrecognizable");
    }

    #[test]
    fn test_date_iso() {
        let d = normalize_date("1975-06-14");
        assert_eq!(d.precision, DatePrecision::Full);
        assert_eq!(d.date, NaiveDate::from_ymd_opt(1975, 6, 14));
    }

    #[test]
    fn test_date_dmy_and_textual() {
        assert_eq!(normalize_date("14/06/1975").precision, DatePrecision::Full);
        assert_eq!(normalize_date("14 Jun 1975").precision, DatePrecision::Full);
    }

    #[test]
    fn test_date_year_only_and_circa() {
        let d = normalize_date("1975");
        assert_eq!(d.precision, DatePrecision::Year);
        assert_eq!(d.date, NaiveDate::from_ymd_opt(1975, 1, 1));

        let d = normalize_date("circa 1975");
        assert_eq!(d.precision, DatePrecision::Year);
        assert_eq!(d.date, NaiveDate::from_ymd_opt(1975, 1, 1));
    }

    #[test]
    fn test_date_year_month() {
        let d = normalize_date("1975-06");
        assert_eq!(d.precision, DatePrecision::YearMonth);
        assert_eq!(d.date, NaiveDate::from_ymd_opt(1975, 6, 1));
    }

    #[test]
    fn test_date_garbage_never_fatal() {
        let d = normalize_date("unknown, sometime in the past");
        assert_eq!(d.precision, DatePrecision::Unknown);
        assert_eq!(d.date, None);
    }

    #[test]
    fn test_identifier_strip_and_uppercase() {
        assert_eq!(normalize_identifier("ab-12 34/56"), "AB123456");
        assert_eq!(normalize_identifier("AB123456"), "AB123456");
    }

    use crate::models::{EntityType, IdentifierKind};

    fn sample_record() -> RawRecord {
        RawRecord {
            source: "ofac".into(),
            source_id: "12345".into(),
            names: vec![
                "SMITH, John A".into(),
                "John Smith".into(),
                "SMITH, John A".into(),
            ],
            entity_type: EntityType::Person,
            addresses: vec!["12 High St, London, United Kingdom".into()],
            identifiers: vec![(IdentifierKind::Passport, "ab-12 34/56".into())],
            dates: vec!["circa 1960".into(), "1962-04-15".into()],
            programs: vec!["SDGT".into()],
            nationality: Some("UK".into()),
        }
    }

    #[test]
    fn test_canonicalize_basic() {
        let now = Utc::now();
        let entity = canonicalize(&sample_record(), now);
        assert_eq!(entity.id, "ofac-12345");
        assert_eq!(entity.name, "john a smith");
        assert_eq!(entity.aliases, vec!["john smith".to_string()]);
        assert!(entity
            .identifiers
            .contains(&(IdentifierKind::Passport, "AB123456".to_string())));
        // First parseable date in record order wins, even when a later
        // entry is more precise.
        assert_eq!(entity.date.precision, DatePrecision::Year);
        assert_eq!(entity.last_updated, now);
    }

    #[test]
    fn test_canonicalize_nationality_adds_country() {
        let mut record = sample_record();
        record.addresses.clear();
        record.nationality = Some("Russian Federation".into());
        let entity = canonicalize(&record, Utc::now());
        assert!(entity.countries().contains("russia"));
    }

    #[test]
    fn test_canonicalize_deterministic() {
        let now = Utc::now();
        let record = sample_record();
        assert_eq!(canonicalize(&record, now), canonicalize(&record, now));
    }
}
