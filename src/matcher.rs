//! Cross-source matching: blocking, pairwise scoring, and union-find
//! merge into [`EntityProfile`]s.
//!
//! Scoring is a weighted mean over the signals present on both sides,
//! so a missing field never counts against a pair. Merges happen only
//! at or above the high threshold; the band between the thresholds
//! produces review flags instead. The whole pass is pure over its
//! input slice and deterministic for a fixed input order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::config::MatchConfig;
use crate::dsu::Dsu;
use crate::models::{
    CanonicalEntity, CanonicalView, ConflictAnnotation, DatePrecision, EntityProfile, EntityType,
    IdentifierKind, ReviewFlag, TaggedDate,
};

/// Result of one matching pass.
#[derive(Debug)]
pub struct MatchOutcome {
    pub profiles: Vec<EntityProfile>,
    /// Unions actually performed (edges at or above the high threshold
    /// that joined two previously distinct sets).
    pub auto_merges: usize,
    /// Pairs that landed in the review band.
    pub flagged_pairs: usize,
}

/// Jaccard similarity over whitespace token sets. Order-insensitive,
/// which catches "al fulani mohammed" vs "mohammed al fulani".
fn token_set_similarity(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

fn names_of(entity: &CanonicalEntity) -> impl Iterator<Item = &str> {
    std::iter::once(entity.name.as_str()).chain(entity.aliases.iter().map(String::as_str))
}

/// Best similarity over every (name or alias) pairing of the two
/// entities, each pairing scored by the better of Jaro-Winkler and
/// token-set similarity.
fn name_similarity(a: &CanonicalEntity, b: &CanonicalEntity) -> f64 {
    let mut best: f64 = 0.0;
    for name_a in names_of(a) {
        for name_b in names_of(b) {
            if name_a.is_empty() || name_b.is_empty() {
                continue;
            }
            let jw = strsim::jaro_winkler(name_a, name_b);
            let ts = token_set_similarity(name_a, name_b);
            best = best.max(jw.max(ts));
            if best >= 1.0 {
                return 1.0;
            }
        }
    }
    best
}

/// Whether two dates agree at the coarser of the two precisions.
/// None when either side lacks a date, so the signal is skipped.
fn dates_agree(a: &TaggedDate, b: &TaggedDate) -> Option<bool> {
    let (date_a, date_b) = match (a.date, b.date) {
        (Some(x), Some(y)) => (x, y),
        _ => return None,
    };
    use chrono::Datelike;
    let coarser = a.precision.max(b.precision);
    Some(match coarser {
        DatePrecision::Full => date_a == date_b,
        DatePrecision::YearMonth => {
            date_a.year() == date_b.year() && date_a.month() == date_b.month()
        }
        DatePrecision::Year | DatePrecision::Unknown => date_a.year() == date_b.year(),
    })
}

/// Pairwise match score in [0, 1]. Symmetric in its entity arguments.
pub fn score(a: &CanonicalEntity, b: &CanonicalEntity, config: &MatchConfig) -> f64 {
    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;

    // Identifier signal: counted only when both sides carry at least
    // one identifier. Exact (kind, value) overlap is decisive.
    if !a.identifiers.is_empty() && !b.identifiers.is_empty() {
        let shared = a.identifiers.intersection(&b.identifiers).next().is_some();
        weight_sum += config.identifier_weight;
        value_sum += config.identifier_weight * if shared { 1.0 } else { 0.0 };
    }

    weight_sum += config.name_weight;
    value_sum += config.name_weight * name_similarity(a, b);

    let countries_a = a.countries();
    let countries_b = b.countries();
    let mut country_conflict = false;
    if !countries_a.is_empty() && !countries_b.is_empty() {
        let shared = countries_a.intersection(&countries_b).next().is_some();
        weight_sum += config.country_weight;
        value_sum += config.country_weight * if shared { 1.0 } else { 0.0 };
        country_conflict = !shared;
    }

    if let Some(agree) = dates_agree(&a.date, &b.date) {
        weight_sum += config.date_weight;
        value_sum += config.date_weight * if agree { 1.0 } else { 0.0 };
    }

    if weight_sum <= 0.0 {
        return 0.0;
    }
    let mut score = value_sum / weight_sum;
    // Disjoint known countries: damp the score rather than zero it.
    // A missed merge is recoverable, a false merge is not.
    if country_conflict {
        score *= config.country_conflict_penalty;
    }
    score.clamp(0.0, 1.0)
}

/// First token of the normalized primary name, or "" when absent.
fn first_name_token(entity: &CanonicalEntity) -> &str {
    entity.name.split_whitespace().next().unwrap_or("")
}

/// Blocking keys for one entity: one per known country plus a
/// countryless key, so a pair is never missed just because one side
/// lacks an address.
fn blocking_keys(entity: &CanonicalEntity) -> Vec<(String, EntityType, Option<String>)> {
    let token = first_name_token(entity).to_string();
    let mut keys = vec![(token.clone(), entity.entity_type, None)];
    for country in entity.countries() {
        keys.push((token.clone(), entity.entity_type, Some(country.to_string())));
    }
    keys
}

/// Candidate index pairs (i < j) that share at least one blocking key.
fn candidate_pairs(entities: &[CanonicalEntity]) -> BTreeSet<(usize, usize)> {
    let mut blocks: HashMap<(String, EntityType, Option<String>), Vec<usize>> = HashMap::new();
    for (idx, entity) in entities.iter().enumerate() {
        for key in blocking_keys(entity) {
            blocks.entry(key).or_default().push(idx);
        }
    }
    let mut pairs = BTreeSet::new();
    for members in blocks.values() {
        for (pos, &i) in members.iter().enumerate() {
            for &j in &members[pos + 1..] {
                pairs.insert((i.min(j), i.max(j)));
            }
        }
    }
    pairs
}

/// Identifier-kind disagreements among a profile's members. Requires
/// at least two members to carry the kind with differing value sets.
fn identifier_conflicts(members: &[&CanonicalEntity]) -> Vec<ConflictAnnotation> {
    let mut per_kind: BTreeMap<IdentifierKind, Vec<BTreeSet<&str>>> = BTreeMap::new();
    for member in members {
        let mut kinds: BTreeMap<IdentifierKind, BTreeSet<&str>> = BTreeMap::new();
        for (kind, value) in &member.identifiers {
            kinds.entry(*kind).or_default().insert(value.as_str());
        }
        for (kind, values) in kinds {
            per_kind.entry(kind).or_default().push(values);
        }
    }
    let mut conflicts = Vec::new();
    for (kind, sets) in per_kind {
        if sets.len() < 2 || sets.iter().all(|s| *s == sets[0]) {
            continue;
        }
        let values: BTreeSet<&str> = sets.iter().flatten().copied().collect();
        conflicts.push(ConflictAnnotation {
            kind,
            values: values.into_iter().map(str::to_string).collect(),
        });
    }
    conflicts
}

/// Field-wise merge of a profile's members, already sorted by
/// (source priority, entity id).
fn build_view(members: &[&CanonicalEntity]) -> CanonicalView {
    let lead = members[0];
    let mut aliases: Vec<String> = Vec::new();
    for member in members {
        for alias in names_of(member) {
            if alias != lead.name && !alias.is_empty() && !aliases.iter().any(|a| a == alias) {
                aliases.push(alias.to_string());
            }
        }
    }
    let entity_type = members
        .iter()
        .map(|m| m.entity_type)
        .find(|t| *t != EntityType::Unknown)
        .unwrap_or(EntityType::Unknown);
    // Finest precision wins; member order breaks ties.
    let date = members
        .iter()
        .map(|m| m.date)
        .min_by_key(|d| d.precision)
        .unwrap_or_else(TaggedDate::unknown);
    CanonicalView {
        name: lead.name.clone(),
        aliases,
        entity_type,
        addresses: members.iter().flat_map(|m| m.addresses.iter().cloned()).collect(),
        identifiers: members
            .iter()
            .flat_map(|m| m.identifiers.iter().cloned())
            .collect(),
        date,
        programs: members.iter().flat_map(|m| m.programs.iter().cloned()).collect(),
        sources: members.iter().map(|m| m.source.clone()).collect(),
        last_updated: members
            .iter()
            .map(|m| m.last_updated)
            .max()
            .unwrap_or_else(chrono::Utc::now),
    }
}

/// Run one matching pass over the canonical entities of a run.
///
/// `priorities` maps source name to its configured priority (lower
/// wins); unlisted sources rank last. Matching never fails: bad input
/// degrades to singleton profiles, not errors.
pub fn run_match(
    entities: Vec<CanonicalEntity>,
    priorities: &BTreeMap<String, u32>,
    config: &MatchConfig,
) -> MatchOutcome {
    fn constrain<F>(f: F) -> F
    where
        F: for<'a> Fn(&'a CanonicalEntity) -> (u32, &'a str),
    {
        f
    }
    let priority_of = constrain(|entity| {
        (
            priorities.get(&entity.source).copied().unwrap_or(u32::MAX),
            entity.id.as_str(),
        )
    });

    let pairs = candidate_pairs(&entities);
    debug!(entities = entities.len(), candidate_pairs = pairs.len(), "matching");

    let mut merge_edges: Vec<(usize, usize)> = Vec::new();
    let mut band_pairs: Vec<(usize, usize, f64)> = Vec::new();
    for &(i, j) in &pairs {
        let pair_score = score(&entities[i], &entities[j], config);
        if pair_score >= config.high_threshold {
            merge_edges.push((i, j));
        } else if pair_score >= config.low_threshold {
            band_pairs.push((i, j, pair_score));
        }
    }

    // Fixed application order makes runs reproducible regardless of
    // how blocking happened to enumerate the pairs.
    merge_edges.sort_by(|&(a1, a2), &(b1, b2)| {
        let key = |i: usize, j: usize| {
            let ki = priority_of(&entities[i]);
            let kj = priority_of(&entities[j]);
            (ki.min(kj), ki.max(kj))
        };
        key(a1, a2).cmp(&key(b1, b2))
    });

    let mut dsu = Dsu::new(entities.len());
    let mut auto_merges = 0;
    for (i, j) in merge_edges {
        if dsu.union(i, j) {
            auto_merges += 1;
        }
    }

    // A band pair can still end up merged transitively; those stop
    // being review items.
    let mut flags_by_index: BTreeMap<usize, Vec<ReviewFlag>> = BTreeMap::new();
    let mut flagged_pairs = 0;
    for (i, j, pair_score) in band_pairs {
        if dsu.same_set(i, j) {
            continue;
        }
        flagged_pairs += 1;
        flags_by_index.entry(i).or_default().push(ReviewFlag {
            entity_id: entities[i].id.clone(),
            candidate_id: entities[j].id.clone(),
            score: pair_score,
        });
        flags_by_index.entry(j).or_default().push(ReviewFlag {
            entity_id: entities[j].id.clone(),
            candidate_id: entities[i].id.clone(),
            score: pair_score,
        });
    }

    let mut profiles = Vec::with_capacity(dsu.set_count());
    for cluster in dsu.clusters() {
        let mut member_indices = cluster;
        member_indices.sort_by(|&a, &b| priority_of(&entities[a]).cmp(&priority_of(&entities[b])));
        let members: Vec<&CanonicalEntity> =
            member_indices.iter().map(|&i| &entities[i]).collect();
        let view = build_view(&members);
        let conflicts = identifier_conflicts(&members);
        let review_flags: Vec<ReviewFlag> = member_indices
            .iter()
            .filter_map(|i| flags_by_index.get(i))
            .flatten()
            .cloned()
            .collect();
        profiles.push(EntityProfile {
            id: members[0].id.clone(),
            members: members.into_iter().cloned().collect(),
            view,
            review_flags,
            conflicts,
        });
    }
    profiles.sort_by(|a, b| a.id.cmp(&b.id));

    MatchOutcome {
        profiles,
        auto_merges,
        flagged_pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, IdentifierKind};
    use chrono::Utc;

    fn entity(source: &str, id: &str, name: &str) -> CanonicalEntity {
        CanonicalEntity {
            id: format!("{source}-{id}"),
            name: name.to_string(),
            aliases: Vec::new(),
            entity_type: EntityType::Person,
            addresses: BTreeSet::new(),
            identifiers: BTreeSet::new(),
            date: TaggedDate::unknown(),
            programs: BTreeSet::new(),
            source: source.to_string(),
            last_updated: Utc::now(),
        }
    }

    fn with_country(mut e: CanonicalEntity, country: &str) -> CanonicalEntity {
        e.addresses.insert(Address {
            country: Some(country.to_string()),
            locality: None,
            remainder: String::new(),
        });
        e
    }

    fn with_identifier(mut e: CanonicalEntity, kind: IdentifierKind, value: &str) -> CanonicalEntity {
        e.identifiers.insert((kind, value.to_string()));
        e
    }

    fn priorities() -> BTreeMap<String, u32> {
        BTreeMap::from([("ofac".to_string(), 10), ("un".to_string(), 20)])
    }

    #[test]
    fn test_score_symmetric() {
        let a = with_country(entity("ofac", "1", "john smith"), "france");
        let b = with_identifier(
            entity("un", "2", "jon smith"),
            IdentifierKind::Passport,
            "AB123456",
        );
        let config = MatchConfig::default();
        assert_eq!(score(&a, &b, &config), score(&b, &a, &config));
    }

    #[test]
    fn test_same_name_shared_passport_merges() {
        let a = with_identifier(
            entity("ofac", "1", "john smith"),
            IdentifierKind::Passport,
            "AB123456",
        );
        let b = with_identifier(
            entity("un", "2", "john smith"),
            IdentifierKind::Passport,
            "AB123456",
        );
        let config = MatchConfig::default();
        assert!(score(&a, &b, &config) >= config.high_threshold);

        let outcome = run_match(vec![a, b], &priorities(), &config);
        assert_eq!(outcome.profiles.len(), 1);
        assert_eq!(outcome.auto_merges, 1);
        assert_eq!(outcome.profiles[0].members.len(), 2);
        // Lead member comes from the higher-priority source.
        assert_eq!(outcome.profiles[0].id, "ofac-1");
    }

    #[test]
    fn test_same_name_disjoint_countries_stays_split() {
        let a = with_country(entity("ofac", "1", "john smith"), "france");
        let b = with_country(entity("un", "2", "john smith"), "brazil");
        let config = MatchConfig::default();
        assert!(score(&a, &b, &config) < config.low_threshold);

        let outcome = run_match(vec![a, b], &priorities(), &config);
        assert_eq!(outcome.profiles.len(), 2);
        assert_eq!(outcome.flagged_pairs, 0);
    }

    #[test]
    fn test_band_score_produces_review_flag() {
        let a = with_country(entity("ofac", "1", "john smith"), "france");
        let b = with_country(entity("un", "2", "jon smith"), "france");
        let config = MatchConfig {
            high_threshold: 0.99,
            low_threshold: 0.50,
            ..MatchConfig::default()
        };
        let pair_score = score(&a, &b, &config);
        assert!(pair_score >= config.low_threshold && pair_score < config.high_threshold);

        let outcome = run_match(vec![a, b], &priorities(), &config);
        assert_eq!(outcome.profiles.len(), 2);
        assert_eq!(outcome.flagged_pairs, 1);
        for profile in &outcome.profiles {
            assert_eq!(profile.review_flags.len(), 1);
        }
    }

    #[test]
    fn test_alias_reaches_full_name_similarity() {
        let mut a = entity("ofac", "1", "mohammed al fulani");
        a.aliases.push("abu hamza".to_string());
        let b = entity("un", "2", "al fulani mohammed");
        assert_eq!(name_similarity(&a, &b), 1.0);
    }

    #[test]
    fn test_identifier_conflict_annotated_not_blocking() {
        let a = with_identifier(
            with_identifier(
                entity("ofac", "1", "acme trading"),
                IdentifierKind::Passport,
                "AB123456",
            ),
            IdentifierKind::TaxId,
            "111",
        );
        let b = with_identifier(
            with_identifier(
                entity("un", "2", "acme trading"),
                IdentifierKind::Passport,
                "AB123456",
            ),
            IdentifierKind::TaxId,
            "222",
        );
        let outcome = run_match(vec![a, b], &priorities(), &MatchConfig::default());
        assert_eq!(outcome.profiles.len(), 1);
        let conflicts = &outcome.profiles[0].conflicts;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, IdentifierKind::TaxId);
        assert_eq!(conflicts[0].values, vec!["111".to_string(), "222".to_string()]);
    }

    #[test]
    fn test_partition_is_total_and_disjoint() {
        let entities = vec![
            with_identifier(
                entity("ofac", "1", "john smith"),
                IdentifierKind::Passport,
                "AB123456",
            ),
            with_identifier(
                entity("un", "2", "john smith"),
                IdentifierKind::Passport,
                "AB123456",
            ),
            entity("eu", "3", "maria garcia"),
            entity("uk", "4", "acme trading"),
        ];
        let input_ids: BTreeSet<String> = entities.iter().map(|e| e.id.clone()).collect();
        let outcome = run_match(entities, &priorities(), &MatchConfig::default());
        let mut seen = BTreeSet::new();
        for profile in &outcome.profiles {
            for member in &profile.members {
                assert!(seen.insert(member.id.clone()), "member in two profiles");
            }
        }
        assert_eq!(seen, input_ids);
    }

    #[test]
    fn test_deterministic_output() {
        let make = || {
            vec![
                with_identifier(
                    entity("un", "9", "john smith"),
                    IdentifierKind::Passport,
                    "AB123456",
                ),
                with_identifier(
                    entity("ofac", "1", "john smith"),
                    IdentifierKind::Passport,
                    "AB123456",
                ),
                entity("eu", "5", "maria garcia"),
            ]
        };
        let first = run_match(make(), &priorities(), &MatchConfig::default());
        let second = run_match(make(), &priorities(), &MatchConfig::default());
        let ids = |o: &MatchOutcome| {
            o.profiles
                .iter()
                .map(|p| (p.id.clone(), p.member_ids().join(",")))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_threshold_boundaries_inclusive() {
        // Name-only agreement scores exactly 1.0; a pair exactly at the
        // high threshold must merge.
        let a = entity("ofac", "1", "john smith");
        let b = entity("un", "2", "john smith");
        let config = MatchConfig {
            high_threshold: 1.0,
            ..MatchConfig::default()
        };
        assert_eq!(score(&a, &b, &config), 1.0);
        let outcome = run_match(vec![a, b], &priorities(), &config);
        assert_eq!(outcome.profiles.len(), 1);

        // Same name, disjoint countries: 0.4 / 0.5 * 0.25 = exactly 0.2.
        // A pair exactly at the low threshold must be flagged.
        let a = with_country(entity("ofac", "1", "john smith"), "france");
        let b = with_country(entity("un", "2", "john smith"), "brazil");
        let config = MatchConfig {
            low_threshold: 0.2,
            ..MatchConfig::default()
        };
        assert_eq!(score(&a, &b, &config), 0.2);
        let outcome = run_match(vec![a, b], &priorities(), &config);
        assert_eq!(outcome.profiles.len(), 2);
        assert_eq!(outcome.flagged_pairs, 1);
    }

    #[test]
    fn test_empty_input() {
        let outcome = run_match(Vec::new(), &priorities(), &MatchConfig::default());
        assert!(outcome.profiles.is_empty());
        assert_eq!(outcome.auto_merges, 0);
    }
}
