//! Queryable unit spaces.
//!
//! A [`UnitSource`] is anything that can enumerate installable units: a
//! loaded repository, a slice, or a [`CompoundSpace`] chaining several of
//! them. The query helpers are provided methods so that every source answers
//! them the same way.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tpr_schema::{InstallableUnit, NAMESPACE_IU_ID, Requirement, UnitKey, Version};

/// A read-only collection of installable units.
pub trait UnitSource: Send + Sync + fmt::Debug {
    /// Enumerate every unit. Duplicate `(id, version)` entries are allowed.
    fn units(&self) -> Box<dyn Iterator<Item = &Arc<InstallableUnit>> + '_>;

    /// Units with the given id, restricted to `version` when given.
    fn query_matching(&self, id: &str, version: Option<&Version>) -> Vec<Arc<InstallableUnit>> {
        self.units()
            .filter(|u| u.id == id && version.is_none_or(|v| u.version == *v))
            .cloned()
            .collect()
    }

    /// The highest-versioned unit returned by [`UnitSource::query_matching`].
    ///
    /// Identical duplicates are interchangeable, so the first one wins.
    fn query_latest(&self, id: &str, version: Option<&Version>) -> Option<Arc<InstallableUnit>> {
        self.query_matching(id, version)
            .into_iter()
            .reduce(|best, u| if u.version > best.version { u } else { best })
    }

    /// Every unit satisfying `requirement`, ignoring filters.
    fn providers_of(&self, requirement: &Requirement) -> Vec<Arc<InstallableUnit>> {
        self.units()
            .filter(|u| requirement.is_satisfied_by(u))
            .cloned()
            .collect()
    }

    /// Number of entries (duplicates included).
    fn len(&self) -> usize {
        self.units().count()
    }

    /// True when the source has no units.
    fn is_empty(&self) -> bool {
        self.units().next().is_none()
    }
}

/// Several sources queried as one.
#[derive(Debug, Clone, Default)]
pub struct CompoundSpace {
    sources: Vec<Arc<dyn UnitSource>>,
}

impl CompoundSpace {
    /// Chain `sources`. A single source is returned as-is.
    pub fn of(mut sources: Vec<Arc<dyn UnitSource>>) -> Arc<dyn UnitSource> {
        if sources.len() == 1 {
            if let Some(only) = sources.pop() {
                return only;
            }
        }
        Arc::new(Self { sources })
    }
}

impl UnitSource for CompoundSpace {
    fn units(&self) -> Box<dyn Iterator<Item = &Arc<InstallableUnit>> + '_> {
        Box::new(self.sources.iter().flat_map(|s| s.units()))
    }
}

/// A set of units keyed by `(id, version)` and iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSet {
    units: BTreeMap<UnitKey, Arc<InstallableUnit>>,
}

impl UnitSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a unit; returns `false` if one with the same identity was present.
    pub fn insert(&mut self, unit: Arc<InstallableUnit>) -> bool {
        let key = unit.key();
        if self.units.contains_key(&key) {
            return false;
        }
        self.units.insert(key, unit);
        true
    }

    /// Check for a unit identity.
    pub fn contains(&self, key: &UnitKey) -> bool {
        self.units.contains_key(key)
    }

    /// Look up a unit by identity.
    pub fn get(&self, key: &UnitKey) -> Option<&Arc<InstallableUnit>> {
        self.units.get(key)
    }

    /// Iterate in `(id, version)` order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<InstallableUnit>> {
        self.units.values()
    }

    /// Identities in order.
    pub fn keys(&self) -> impl Iterator<Item = &UnitKey> {
        self.units.keys()
    }

    /// Number of distinct units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Copy the units into a vector.
    pub fn to_vec(&self) -> Vec<Arc<InstallableUnit>> {
        self.units.values().cloned().collect()
    }
}

impl UnitSource for UnitSet {
    fn units(&self) -> Box<dyn Iterator<Item = &Arc<InstallableUnit>> + '_> {
        Box::new(self.units.values())
    }
}

impl Extend<Arc<InstallableUnit>> for UnitSet {
    fn extend<I: IntoIterator<Item = Arc<InstallableUnit>>>(&mut self, iter: I) {
        for unit in iter {
            self.insert(unit);
        }
    }
}

impl FromIterator<Arc<InstallableUnit>> for UnitSet {
    fn from_iter<I: IntoIterator<Item = Arc<InstallableUnit>>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl FromIterator<InstallableUnit> for UnitSet {
    fn from_iter<I: IntoIterator<Item = InstallableUnit>>(iter: I) -> Self {
        iter.into_iter().map(Arc::new).collect()
    }
}

impl IntoIterator for UnitSet {
    type Item = Arc<InstallableUnit>;
    type IntoIter = std::collections::btree_map::IntoValues<UnitKey, Arc<InstallableUnit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_values()
    }
}

impl<'a> IntoIterator for &'a UnitSet {
    type Item = &'a Arc<InstallableUnit>;
    type IntoIter = std::collections::btree_map::Values<'a, UnitKey, Arc<InstallableUnit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.values()
    }
}

/// Lookup of units by the `(namespace, name)` pairs they provide.
///
/// Every unit is indexed under its own id in the unit namespace and under
/// each provided capability. Duplicate identities are dropped.
#[derive(Debug, Default)]
pub struct CapabilityIndex {
    entries: HashMap<(String, String), Vec<Arc<InstallableUnit>>>,
}

impl CapabilityIndex {
    /// Index every unit of `source`.
    pub fn build(source: &dyn UnitSource) -> Self {
        let mut index = Self::default();
        let mut seen = HashSet::new();
        for unit in source.units() {
            if !seen.insert(unit.key()) {
                continue;
            }
            index.add(NAMESPACE_IU_ID, &unit.id, unit);
            for capability in &unit.provides {
                index.add(&capability.namespace, &capability.name, unit);
            }
        }
        index
    }

    fn add(&mut self, namespace: &str, name: &str, unit: &Arc<InstallableUnit>) {
        let bucket = self
            .entries
            .entry((namespace.to_string(), name.to_string()))
            .or_default();
        if !bucket.iter().any(|u| Arc::ptr_eq(u, unit)) {
            bucket.push(Arc::clone(unit));
        }
    }

    /// Units satisfying `requirement`, in indexing order.
    pub fn providers(&self, requirement: &Requirement) -> Vec<Arc<InstallableUnit>> {
        self.entries
            .get(&(requirement.namespace.clone(), requirement.name.clone()))
            .into_iter()
            .flatten()
            .filter(|u| requirement.is_satisfied_by(u))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tpr_schema::{ProvidedCapability, VersionRange};

    pub(crate) fn unit(id: &str, version: &str) -> InstallableUnit {
        InstallableUnit::new(id, Version::parse(version).unwrap())
    }

    fn set(units: Vec<InstallableUnit>) -> Arc<dyn UnitSource> {
        Arc::new(units.into_iter().collect::<UnitSet>())
    }

    #[test]
    fn test_query_latest_picks_highest_version() {
        let space = set(vec![unit("a", "1.0"), unit("a", "2.0"), unit("b", "3.0")]);
        let latest = space.query_latest("a", None).unwrap();
        assert_eq!(latest.version, Version::new(2, 0, 0));

        let exact = space
            .query_latest("a", Some(&Version::new(1, 0, 0)))
            .unwrap();
        assert_eq!(exact.version, Version::new(1, 0, 0));

        assert!(space.query_latest("a", Some(&Version::new(3, 0, 0))).is_none());
        assert!(space.query_latest("missing", None).is_none());
    }

    #[test]
    fn test_compound_space_chains_sources() {
        let first = set(vec![unit("a", "1.0")]);
        let second = set(vec![unit("a", "1.5"), unit("c", "1.0")]);
        let compound = CompoundSpace::of(vec![first, second]);
        assert_eq!(compound.len(), 3);
        assert_eq!(
            compound.query_latest("a", None).unwrap().version,
            Version::new(1, 5, 0)
        );
    }

    #[test]
    fn test_compound_of_one_is_pass_through() {
        let only = set(vec![unit("a", "1.0")]);
        let compound = CompoundSpace::of(vec![Arc::clone(&only)]);
        assert!(Arc::ptr_eq(&only, &compound));
    }

    #[test]
    fn test_compound_keeps_duplicates() {
        let first = set(vec![unit("a", "1.0")]);
        let second = set(vec![unit("a", "1.0")]);
        let compound = CompoundSpace::of(vec![first, second]);
        assert_eq!(compound.query_matching("a", None).len(), 2);
        assert!(compound.query_latest("a", None).is_some());
    }

    #[test]
    fn test_providers_of_capability() {
        let api = ProvidedCapability::new("java.package", "org.example", Version::new(1, 0, 0));
        let space = set(vec![
            unit("impl.a", "1.0").with_capability(api.clone()),
            unit("impl.b", "2.0").with_capability(api),
            unit("unrelated", "1.0"),
        ]);
        let req = Requirement::new("java.package", "org.example", VersionRange::any());
        let providers = space.providers_of(&req);
        assert_eq!(providers.len(), 2);
    }

    #[test]
    fn test_capability_index_matches_scan() {
        let api = ProvidedCapability::new("java.package", "org.example", Version::new(1, 0, 0));
        let first = set(vec![unit("a", "1.0"), unit("a", "2.0").with_capability(api)]);
        let second = set(vec![unit("a", "1.0")]);
        let compound = CompoundSpace::of(vec![first, second]);
        let index = CapabilityIndex::build(compound.as_ref());

        let req = Requirement::unit("a", VersionRange::parse("[1.0,2.0)").unwrap());
        let providers = index.providers(&req);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].version, Version::new(1, 0, 0));

        let pkg = Requirement::new("java.package", "org.example", VersionRange::any());
        assert_eq!(index.providers(&pkg).len(), 1);
        assert!(index.providers(&Requirement::unit("b", VersionRange::any())).is_empty());
    }

    #[test]
    fn test_unit_set_dedupes_by_identity() {
        let mut units = UnitSet::new();
        assert!(units.insert(Arc::new(unit("a", "1.0"))));
        assert!(!units.insert(Arc::new(unit("a", "1.0").as_group())));
        assert!(units.insert(Arc::new(unit("a", "1.1"))));
        assert_eq!(units.len(), 2);
        let ids: Vec<String> = units.keys().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["a/1.0.0", "a/1.1.0"]);
    }
}
