//! Source adapter contract.
//!
//! One adapter per publishing authority. Each adapter knows where its list
//! lives (URL or mock path from config) and how to parse the payload into
//! [`RawRecord`]s. The orchestrator never inspects adapter internals; it
//! only calls `fetch` and `parse`.
//!
//! Parsing is defensive per record: a malformed entry is skipped and
//! counted, never aborts the source. Only a structurally unusable payload
//! (broken XML, undecodable CSV) is a [`ParseError`].

use async_trait::async_trait;

use crate::adapter_eu::EuAdapter;
use crate::adapter_ofac::OfacAdapter;
use crate::adapter_uk::UkAdapter;
use crate::adapter_un::UnAdapter;
use crate::config::{Config, SourceConfig};
use crate::error::{FetchError, ParseError};
use crate::models::RawRecord;
use crate::transport::Transport;

/// Result of parsing one payload: the records that survived plus a count
/// of malformed entries that were skipped.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub records: Vec<RawRecord>,
    pub skipped: u64,
}

/// A sanctions-list source: fetch raw bytes, parse into raw records.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source label, used as the `source` field of every record.
    fn name(&self) -> &str;

    /// One-line description for `sw sources` output.
    fn description(&self) -> &str;

    /// Fetch the raw payload through the given transport.
    async fn fetch(&self, transport: &dyn Transport) -> Result<Vec<u8>, FetchError>;

    /// Parse a payload into raw records, skipping malformed entries.
    fn parse(&self, payload: &[u8]) -> Result<ParseOutcome, ParseError>;
}

impl std::fmt::Debug for dyn SourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("name", &self.name())
            .finish()
    }
}

/// Resolve the adapter for a configured source name. Sources are selected
/// at configuration time; unknown names are a configuration error.
pub fn resolve(name: &str, source: &SourceConfig) -> Option<Box<dyn SourceAdapter>> {
    let location = source
        .mock_path
        .as_ref()
        .map(|p| p.display().to_string())
        .or_else(|| source.url.clone())?;

    match name {
        "ofac" => Some(Box::new(OfacAdapter::new(location))),
        "un" => Some(Box::new(UnAdapter::new(location))),
        "eu" => Some(Box::new(EuAdapter::new(location))),
        "uk" => Some(Box::new(UkAdapter::new(location))),
        _ => None,
    }
}

/// All adapters for the sources a run selects, in config (alphabetical)
/// order. `selection` empty means all configured sources.
pub fn resolve_selected(
    config: &Config,
    selection: &[String],
) -> anyhow::Result<Vec<(Box<dyn SourceAdapter>, SourceConfig)>> {
    let mut adapters = Vec::new();
    for (name, source) in &config.sources {
        if !selection.is_empty() && !selection.iter().any(|s| s == name) {
            continue;
        }
        let adapter = resolve(name, source).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown source '{}'; available: ofac, un, eu, uk",
                name
            )
        })?;
        adapters.push((adapter, source.clone()));
    }

    for requested in selection {
        if !config.sources.contains_key(requested) {
            anyhow::bail!("source '{}' is not configured", requested);
        }
    }

    if adapters.is_empty() {
        anyhow::bail!("no sources selected");
    }
    Ok(adapters)
}

/// Payload must decode as UTF-8 before any format-level parsing.
pub(crate) fn payload_str(payload: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(payload).map_err(|_| ParseError::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn source(url: &str) -> SourceConfig {
        SourceConfig {
            url: Some(url.to_string()),
            mock_path: None,
            rate_limit_secs: 0.0,
            timeout_secs: 5,
            priority: 100,
        }
    }

    #[test]
    fn test_resolve_known_sources() {
        for name in ["ofac", "un", "eu", "uk"] {
            let adapter = resolve(name, &source("https://example.invalid/list")).unwrap();
            assert_eq!(adapter.name(), name);
        }
        assert!(resolve("interpol", &source("https://example.invalid/x")).is_none());
    }

    #[test]
    fn test_mock_path_wins_over_url() {
        let cfg = SourceConfig {
            url: Some("https://example.invalid/list".to_string()),
            mock_path: Some(PathBuf::from("fixtures/sdn.xml")),
            rate_limit_secs: 0.0,
            timeout_secs: 5,
            priority: 100,
        };
        // Resolution succeeds; the location preference itself is exercised
        // through the fetch tests in the adapter modules.
        assert!(resolve("ofac", &cfg).is_some());
    }

    #[test]
    fn test_resolve_selected_rejects_unconfigured() {
        let config = Config {
            fetch: Default::default(),
            matching: Default::default(),
            sources: BTreeMap::from([("ofac".to_string(), source("https://example.invalid/l"))]),
        };
        let err = resolve_selected(&config, &["uk".to_string()]).unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
