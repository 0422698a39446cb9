//! The `sw sources` listing: configured sources and a cheap health
//! check (mock file presence, or a usable URL) without fetching.

use anyhow::Result;

use crate::adapter::resolve;
use crate::config::Config;

/// Health of one configured source, determined without network access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHealth {
    pub name: String,
    pub description: String,
    pub location: String,
    pub healthy: bool,
}

pub fn check_sources(config: &Config) -> Vec<SourceHealth> {
    let mut checks = Vec::with_capacity(config.sources.len());
    for (name, source) in &config.sources {
        let (location, healthy) = match (&source.mock_path, &source.url) {
            (Some(path), _) => (path.display().to_string(), path.exists()),
            (None, Some(url)) => (
                url.clone(),
                url.starts_with("http://") || url.starts_with("https://"),
            ),
            (None, None) => ("(unset)".to_string(), false),
        };
        let description = match resolve(name, source) {
            Some(adapter) => adapter.description().to_string(),
            None => "unknown source".to_string(),
        };
        checks.push(SourceHealth {
            name: name.clone(),
            description,
            location,
            healthy,
        });
    }
    checks
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<8} {:<10} {:<40} LOCATION", "SOURCE", "HEALTHY", "DESCRIPTION");
    for check in check_sources(config) {
        println!(
            "{:<8} {:<10} {:<40} {}",
            check.name,
            if check.healthy { "ok" } else { "unhealthy" },
            check.description,
            check.location
        );
    }
    Ok(())
}
