//! In-memory profile registry built by the pipeline after matching.
//!
//! Read-only once built: lookups by profile or member id, by any
//! contained identifier, and by normalized-name prefix, plus an
//! iterator over profiles for the exporters.

use std::collections::{BTreeMap, HashMap};

use crate::models::{EntityProfile, IdentifierKind};

#[derive(Debug, Default)]
pub struct Registry {
    profiles: BTreeMap<String, EntityProfile>,
    /// Member entity id -> profile id.
    member_index: HashMap<String, String>,
    /// (kind, normalized value) -> profile ids carrying it.
    identifier_index: HashMap<(IdentifierKind, String), Vec<String>>,
    /// Normalized name or alias -> profile ids, ordered for prefix scans.
    name_index: BTreeMap<String, Vec<String>>,
}

impl Registry {
    pub fn build(profiles: Vec<EntityProfile>) -> Self {
        let mut registry = Registry::default();
        for profile in profiles {
            for member in &profile.members {
                registry
                    .member_index
                    .insert(member.id.clone(), profile.id.clone());
            }
            for (kind, value) in &profile.view.identifiers {
                registry
                    .identifier_index
                    .entry((*kind, value.clone()))
                    .or_default()
                    .push(profile.id.clone());
            }
            for name in
                std::iter::once(&profile.view.name).chain(profile.view.aliases.iter())
            {
                if !name.is_empty() {
                    registry
                        .name_index
                        .entry(name.clone())
                        .or_default()
                        .push(profile.id.clone());
                }
            }
            registry.profiles.insert(profile.id.clone(), profile);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Look up by profile id, falling back to member entity id.
    pub fn get(&self, id: &str) -> Option<&EntityProfile> {
        if let Some(profile) = self.profiles.get(id) {
            return Some(profile);
        }
        self.member_index
            .get(id)
            .and_then(|profile_id| self.profiles.get(profile_id))
    }

    /// Profiles carrying the given identifier, normalized value.
    pub fn by_identifier(&self, kind: IdentifierKind, value: &str) -> Vec<&EntityProfile> {
        self.identifier_index
            .get(&(kind, value.to_string()))
            .map(|ids| ids.iter().filter_map(|id| self.profiles.get(id)).collect())
            .unwrap_or_default()
    }

    /// Profiles whose view name or any alias starts with the prefix.
    /// The prefix is matched against normalized names, so callers pass
    /// lowercase input. Results are deduplicated, ordered by profile id.
    pub fn by_name_prefix(&self, prefix: &str) -> Vec<&EntityProfile> {
        let mut matched: BTreeMap<&str, &EntityProfile> = BTreeMap::new();
        let range = self.name_index.range(prefix.to_string()..);
        for (name, profile_ids) in range {
            if !name.starts_with(prefix) {
                break;
            }
            for id in profile_ids {
                if let Some(profile) = self.profiles.get(id) {
                    matched.insert(profile.id.as_str(), profile);
                }
            }
        }
        matched.into_values().collect()
    }

    /// Profiles in id order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityProfile> {
        self.profiles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::matcher::run_match;
    use crate::models::{CanonicalEntity, EntityType, TaggedDate};
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};

    fn profile_for(source: &str, id: &str, name: &str, passport: Option<&str>) -> CanonicalEntity {
        let mut identifiers = BTreeSet::new();
        if let Some(value) = passport {
            identifiers.insert((IdentifierKind::Passport, value.to_string()));
        }
        CanonicalEntity {
            id: format!("{source}-{id}"),
            name: name.to_string(),
            aliases: Vec::new(),
            entity_type: EntityType::Person,
            addresses: BTreeSet::new(),
            identifiers,
            date: TaggedDate::unknown(),
            programs: BTreeSet::new(),
            source: source.to_string(),
            last_updated: Utc::now(),
        }
    }

    fn build_registry() -> Registry {
        let entities = vec![
            profile_for("ofac", "1", "john smith", Some("AB123456")),
            profile_for("un", "2", "john smith", Some("AB123456")),
            profile_for("eu", "3", "maria garcia", None),
        ];
        let priorities = BTreeMap::from([("ofac".to_string(), 10), ("un".to_string(), 20)]);
        let outcome = run_match(entities, &priorities, &MatchConfig::default());
        Registry::build(outcome.profiles)
    }

    #[test]
    fn test_lookup_by_profile_and_member_id() {
        let registry = build_registry();
        assert_eq!(registry.len(), 2);
        let profile = registry.get("ofac-1").unwrap();
        assert_eq!(profile.members.len(), 2);
        // The merged member resolves to the same profile.
        let via_member = registry.get("un-2").unwrap();
        assert_eq!(via_member.id, profile.id);
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_lookup_by_identifier() {
        let registry = build_registry();
        let hits = registry.by_identifier(IdentifierKind::Passport, "AB123456");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "ofac-1");
        assert!(registry.by_identifier(IdentifierKind::TaxId, "AB123456").is_empty());
    }

    #[test]
    fn test_lookup_by_name_prefix() {
        let registry = build_registry();
        let hits = registry.by_name_prefix("john");
        assert_eq!(hits.len(), 1);
        let hits = registry.by_name_prefix("mar");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].view.name, "maria garcia");
        assert!(registry.by_name_prefix("zz").is_empty());
    }

    #[test]
    fn test_iter_in_id_order() {
        let registry = build_registry();
        let ids: Vec<&str> = registry.iter().map(|p| p.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
