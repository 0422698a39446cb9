//! Export the registry as JSON or CSV for downstream screening tools.
//!
//! JSON carries full profiles (members, review flags, conflicts); the
//! CSV is a flat one-row-per-profile summary.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::registry::Registry;

/// Output format for `crawl --output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[derive(Serialize)]
struct ExportData<'a> {
    profiles: Vec<&'a crate::models::EntityProfile>,
}

/// Export all profiles.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn run_export(registry: &Registry, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let rendered = match format {
        ExportFormat::Json => render_json(registry)?,
        ExportFormat::Csv => render_csv(registry)?,
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &rendered)?;
            eprintln!("Exported {} profiles to {}", registry.len(), path.display());
        }
        None => {
            println!("{rendered}");
        }
    }
    Ok(())
}

fn render_json(registry: &Registry) -> Result<String> {
    let data = ExportData {
        profiles: registry.iter().collect(),
    };
    Ok(serde_json::to_string_pretty(&data)?)
}

fn render_csv(registry: &Registry) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "profile_id",
        "name",
        "type",
        "aliases",
        "countries",
        "identifiers",
        "programs",
        "sources",
        "members",
        "review_flags",
        "conflicts",
    ])?;
    for profile in registry.iter() {
        let view = &profile.view;
        let countries: Vec<&str> = view
            .addresses
            .iter()
            .filter_map(|a| a.country.as_deref())
            .collect();
        let identifiers: Vec<String> = view
            .identifiers
            .iter()
            .map(|(kind, value)| format!("{}:{}", kind.as_str(), value))
            .collect();
        writer.write_record([
            profile.id.as_str(),
            view.name.as_str(),
            view.entity_type.as_str(),
            &view.aliases.join(";"),
            &countries.join(";"),
            &identifiers.join(";"),
            &view.programs.iter().cloned().collect::<Vec<_>>().join(";"),
            &view.sources.iter().cloned().collect::<Vec<_>>().join(";"),
            &profile.members.len().to_string(),
            &profile.review_flags.len().to_string(),
            &profile.conflicts.len().to_string(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing csv output: {e}"))?;
    Ok(String::from_utf8(bytes)?)
}
