//! End-to-end run: fetch all selected sources, canonicalize whatever
//! they produced, match across sources, and build the registry.
//!
//! A run only errors out before fetching starts (bad selection) or
//! when every single source failed. Partial failure is a normal run
//! with a report that says so.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::adapter::resolve_selected;
use crate::config::Config;
use crate::error::RunFailure;
use crate::fetch::fetch_all;
use crate::matcher::run_match;
use crate::models::{RunReport, SourceReport};
use crate::normalize::canonicalize;
use crate::registry::Registry;
use crate::transport::Transport;

/// Everything a finished run produces.
pub struct RunOutput {
    pub report: RunReport,
    pub registry: Registry,
}

impl RunOutput {
    /// Total failure: not a single source produced records.
    pub fn failure(&self) -> Option<RunFailure> {
        if self.report.any_succeeded() {
            None
        } else {
            Some(RunFailure {
                attempted: self.report.sources.len(),
            })
        }
    }
}

/// Apply run-level CLI overrides to the loaded config.
///
/// `--mock-dir` points every selected source at `<dir>/<name>.<ext>`;
/// `--rate-limit` replaces every source's request spacing.
pub fn apply_overrides(config: &mut Config, mock_dir: Option<&Path>, rate_limit: Option<f64>) {
    for (name, source) in config.sources.iter_mut() {
        if let Some(dir) = mock_dir {
            let ext = if name == "uk" { "csv" } else { "xml" };
            source.mock_path = Some(dir.join(format!("{name}.{ext}")));
        }
        if let Some(secs) = rate_limit {
            source.rate_limit_secs = secs;
        }
    }
}

/// Run the pipeline for the selected sources (empty selection = all).
pub async fn run(
    config: &Config,
    selection: &[String],
    transport: Arc<dyn Transport>,
) -> Result<RunOutput> {
    let started_at = Utc::now();
    let adapters = resolve_selected(config, selection)?;
    info!(sources = adapters.len(), "starting run");

    let outcomes = fetch_all(adapters, &config.fetch, transport).await;

    let mut entities = Vec::new();
    let mut sources = Vec::with_capacity(outcomes.len());
    for outcome in &outcomes {
        for record in &outcome.records {
            entities.push(canonicalize(record, started_at));
        }
        sources.push(SourceReport {
            source: outcome.source.clone(),
            status: outcome.status,
            records: outcome.records.len() as u64,
            parse_failures: outcome.parse_failures,
            attempts: outcome.attempts,
            error: outcome.error.clone(),
        });
    }
    let entity_count = entities.len() as u64;

    let priorities: BTreeMap<String, u32> = config
        .sources
        .iter()
        .map(|(name, source)| (name.clone(), source.priority))
        .collect();
    let matched = run_match(entities, &priorities, &config.matching);
    let conflicts: u64 = matched.profiles.iter().map(|p| p.conflicts.len() as u64).sum();
    let profile_count = matched.profiles.len() as u64;

    info!(
        entities = entity_count,
        profiles = profile_count,
        auto_merges = matched.auto_merges,
        "run finished"
    );

    let report = RunReport {
        started_at,
        sources,
        entities: entity_count,
        profiles: profile_count,
        auto_merges: matched.auto_merges as u64,
        review_flags: matched.flagged_pairs as u64,
        conflicts,
    };
    Ok(RunOutput {
        report,
        registry: Registry::build(matched.profiles),
    })
}

/// Transport for a live run: http(s) URLs over the wire, mock paths
/// from disk. The client-level timeout matches the slowest source;
/// per-attempt deadlines are enforced by the orchestrator.
pub fn build_transport(config: &Config) -> Result<Arc<dyn Transport>> {
    let timeout = config
        .sources
        .values()
        .map(|s| s.timeout_secs)
        .max()
        .unwrap_or(60);
    let transport = crate::transport::AutoTransport::new(std::time::Duration::from_secs(timeout))?;
    Ok(Arc::new(transport))
}

fn print_report(report: &RunReport) {
    println!(
        "{:<8} {:<16} {:>8} {:>8} {:>8}  ERROR",
        "SOURCE", "STATUS", "RECORDS", "SKIPPED", "ATTEMPTS"
    );
    for source in &report.sources {
        println!(
            "{:<8} {:<16} {:>8} {:>8} {:>8}  {}",
            source.source,
            source.status.as_str(),
            source.records,
            source.parse_failures,
            source.attempts,
            source.error.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!(
        "{} entities -> {} profiles ({} merges, {} review flags, {} conflicts)",
        report.entities,
        report.profiles,
        report.auto_merges,
        report.review_flags,
        report.conflicts
    );
}

/// The `sw crawl` command: run the pipeline, print the report, and
/// optionally export the registry.
pub async fn run_crawl(
    config: &Config,
    selection: &[String],
    format: crate::export::ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let transport = build_transport(config)?;
    let run_output = run(config, selection, transport).await?;
    print_report(&run_output.report);
    if let Some(path) = output {
        crate::export::run_export(&run_output.registry, format, Some(path))?;
    }
    if let Some(failure) = run_output.failure() {
        return Err(failure.into());
    }
    Ok(())
}

/// The `sw validate` command: same pipeline, report only. Surfaces
/// what a crawl would ingest without exporting anything.
pub async fn run_validate(config: &Config, selection: &[String]) -> Result<()> {
    let transport = build_transport(config)?;
    let run_output = run(config, selection, transport).await?;
    print_report(&run_output.report);
    let unresolved: usize = run_output
        .registry
        .iter()
        .map(|p| p.review_flags.len())
        .sum();
    println!("{unresolved} unresolved review flags across profiles");
    if let Some(failure) = run_output.failure() {
        return Err(failure.into());
    }
    Ok(())
}
