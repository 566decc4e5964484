//! Installable units, their requirements and provided capabilities.

use crate::context::SelectionContext;
use crate::filter::Filter;
use crate::version::{Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Namespace in which every unit implicitly provides its own id.
pub const NAMESPACE_IU_ID: &str = "org.eclipse.equinox.p2.iu";

/// Unit property marking a group (feature-like) unit.
pub const PROP_TYPE_GROUP: &str = "org.eclipse.equinox.p2.type.group";

/// Upper cardinality meaning "no limit".
pub const UNBOUNDED: u32 = u32::MAX;

fn one() -> u32 {
    1
}

fn yes() -> bool {
    true
}

/// The `(id, version)` identity of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    /// Unit identifier.
    pub id: String,
    /// Unit version.
    pub version: Version,
}

impl UnitKey {
    /// Create a key.
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.version)
    }
}

/// A capability a unit offers to others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvidedCapability {
    /// Capability namespace, e.g. `java.package`.
    pub namespace: String,
    /// Capability name.
    pub name: String,
    /// Capability version.
    #[serde(default)]
    pub version: Version,
}

impl ProvidedCapability {
    /// Create a capability.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
        }
    }
}

/// A dependency expression from one unit against a capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// Capability namespace.
    pub namespace: String,
    /// Capability name.
    pub name: String,
    /// Accepted capability versions.
    #[serde(default)]
    pub range: VersionRange,
    /// Only applies when this filter matches the selection context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Minimum number of providers; zero marks an optional requirement.
    #[serde(default = "one")]
    pub min: u32,
    /// Maximum number of providers, [`UNBOUNDED`] for no limit.
    #[serde(default = "one")]
    pub max: u32,
    /// Whether the requirement pulls providers into a solution.
    #[serde(default = "yes")]
    pub greedy: bool,
}

impl Requirement {
    /// A mandatory, greedy requirement in the given namespace.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            range,
            filter: None,
            min: 1,
            max: 1,
            greedy: true,
        }
    }

    /// A requirement on another unit by id.
    pub fn unit(name: impl Into<String>, range: VersionRange) -> Self {
        Self::new(NAMESPACE_IU_ID, name, range)
    }

    /// Set the cardinality.
    pub fn with_cardinality(mut self, min: u32, max: u32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Make the requirement optional (`min = 0`).
    pub fn optional(self) -> Self {
        let max = self.max;
        self.with_cardinality(0, max)
    }

    /// Attach a filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the greedy flag.
    pub fn with_greedy(mut self, greedy: bool) -> Self {
        self.greedy = greedy;
        self
    }

    /// True when `min == 0`.
    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    /// True when this targets a unit id rather than a general capability.
    pub fn is_unit_requirement(&self) -> bool {
        self.namespace == NAMESPACE_IU_ID
    }

    /// True when the filter is absent or matches `context`.
    pub fn is_applicable_in(&self, context: &SelectionContext) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(context))
    }

    /// Check whether `unit` satisfies this requirement.
    pub fn is_satisfied_by(&self, unit: &InstallableUnit) -> bool {
        if self.is_unit_requirement() && unit.id == self.name && self.range.contains(&unit.version)
        {
            return true;
        }
        unit.provides.iter().any(|cap| {
            cap.namespace == self.namespace
                && cap.name == self.name
                && self.range.contains(&cap.version)
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {} {}", self.namespace, self.name, self.range)?;
        if let Some(filter) = &self.filter {
            write!(f, " {filter}")?;
        }
        Ok(())
    }
}

/// Reference to an artifact (binary payload) belonging to a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Artifact classifier, e.g. `osgi.bundle`.
    pub classifier: String,
    /// Artifact id.
    pub id: String,
    /// Artifact version.
    pub version: Version,
}

impl ArtifactKey {
    /// Create an artifact key.
    pub fn new(classifier: impl Into<String>, id: impl Into<String>, version: Version) -> Self {
        Self {
            classifier: classifier.into(),
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.classifier, self.id, self.version)
    }
}

/// An immutable, versioned component supplied by a repository.
///
/// Identity is `(id, version)`: equality, hashing and ordering ignore every
/// other field, since repositories may carry identical duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallableUnit {
    /// Unit identifier.
    pub id: String,
    /// Unit version.
    pub version: Version,
    /// Dependencies on other units or capabilities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
    /// Capabilities this unit offers besides its own id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<ProvidedCapability>,
    /// The unit only applies in environments matching this filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// At most one version of a singleton may be selected.
    #[serde(default)]
    pub singleton: bool,
    /// Free-form metadata such as the group marker.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Artifacts that belong to the unit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactKey>,
}

impl InstallableUnit {
    /// Create a unit with no requirements.
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            requirements: Vec::new(),
            provides: Vec::new(),
            filter: None,
            singleton: false,
            properties: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    /// Add a requirement.
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Add a provided capability.
    pub fn with_capability(mut self, capability: ProvidedCapability) -> Self {
        self.provides.push(capability);
        self
    }

    /// Set the environment filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the singleton flag.
    pub fn with_singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Set a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Mark the unit as a group.
    pub fn as_group(self) -> Self {
        self.with_property(PROP_TYPE_GROUP, "true")
    }

    /// Attach an artifact key.
    pub fn with_artifact(mut self, artifact: ArtifactKey) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// The `(id, version)` identity.
    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.id.clone(), self.version.clone())
    }

    /// True when the group marker property is `true`.
    pub fn is_group(&self) -> bool {
        self.properties
            .get(PROP_TYPE_GROUP)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// True when the unit's own filter is absent or matches `context`.
    pub fn is_applicable_in(&self, context: &SelectionContext) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(context))
    }
}

impl PartialEq for InstallableUnit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version
    }
}

impl Eq for InstallableUnit {}

impl Hash for InstallableUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.version.hash(state);
    }
}

impl PartialOrd for InstallableUnit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstallableUnit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for InstallableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_identity_ignores_metadata() {
        let a = InstallableUnit::new("a", v("1.0")).with_property("x", "1");
        let b = InstallableUnit::new("a", v("1.0")).as_group();
        assert_eq!(a, b);
        assert_ne!(a, InstallableUnit::new("a", v("1.0.1")));
        assert_eq!(a.key().to_string(), "a/1.0.0");
    }

    #[test]
    fn test_unit_requirement_matching() {
        let req = Requirement::unit("lib", VersionRange::parse("[1.0,2.0)").unwrap());
        assert!(req.is_satisfied_by(&InstallableUnit::new("lib", v("1.4"))));
        assert!(!req.is_satisfied_by(&InstallableUnit::new("lib", v("2.0"))));
        assert!(!req.is_satisfied_by(&InstallableUnit::new("other", v("1.4"))));
    }

    #[test]
    fn test_capability_requirement_matching() {
        let provider = InstallableUnit::new("impl", v("3.0")).with_capability(
            ProvidedCapability::new("java.package", "org.example.api", v("1.2")),
        );
        let req = Requirement::new(
            "java.package",
            "org.example.api",
            VersionRange::parse("1.0").unwrap(),
        );
        assert!(req.is_satisfied_by(&provider));

        let too_new = Requirement::new(
            "java.package",
            "org.example.api",
            VersionRange::parse("[2.0,3.0)").unwrap(),
        );
        assert!(!too_new.is_satisfied_by(&provider));
    }

    #[test]
    fn test_group_marker() {
        assert!(InstallableUnit::new("f", v("1")).as_group().is_group());
        assert!(!InstallableUnit::new("b", v("1")).is_group());
    }

    #[test]
    fn test_filters() {
        let ctx: SelectionContext = [("osgi.os", "linux")].into_iter().collect();
        let unit = InstallableUnit::new("native", v("1"))
            .with_filter(Filter::equal("osgi.os", "win32"));
        assert!(!unit.is_applicable_in(&ctx));

        let req = Requirement::unit("x", VersionRange::any())
            .optional()
            .with_filter(Filter::equal("osgi.os", "linux"));
        assert!(req.is_optional());
        assert!(req.is_applicable_in(&ctx));
    }

    #[test]
    fn test_unit_deserializes_with_defaults() {
        let json = r#"{
            "id": "app",
            "version": "1.0.0",
            "requirements": [{ "namespace": "org.eclipse.equinox.p2.iu", "name": "lib", "range": "[1.0.0,1.0.0]" }]
        }"#;
        let unit: InstallableUnit = serde_json::from_str(json).unwrap();
        assert!(!unit.singleton);
        let req = &unit.requirements[0];
        assert_eq!((req.min, req.max, req.greedy), (1, 1, true));
        assert!(req.range.is_exact());
    }
}
