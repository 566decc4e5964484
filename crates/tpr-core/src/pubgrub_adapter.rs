//! `PubGrub` adapter for unit resolution.
//!
//! Installable units do not map one-to-one onto `PubGrub` packages: a
//! requirement may be met by any unit providing a capability, and several
//! versions of a non-singleton unit may be installed side by side. The
//! adapter therefore introduces three kinds of solver package:
//!
//! - one package per singleton id, whose versions are the unit versions;
//! - one single-version package per non-singleton `(id, version)`;
//! - one proxy package per distinct requirement, whose versions index its
//!   candidate providers, latest first.
//!
//! A unit depends on the proxies of its requirements, and each proxy version
//! depends on the provider it stands for. Optional greedy requirements get an
//! extra "none" version ranked last, so they are met whenever possible.
//! Non-greedy requirements only offer providers reachable from the root
//! through greedy requirements, so they never pull in anything new.

use crate::planner::{Planner, SolveRequest, Unsatisfiable};
use crate::space::{CapabilityIndex, UnitSet};
use pubgrub::error::PubGrubError;
use pubgrub::range::Range;
use pubgrub::report::{DefaultStringReporter, Reporter};
use pubgrub::solver::{
    Dependencies, DependencyConstraints, DependencyProvider, choose_package_with_fewest_versions,
};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tpr_schema::{
    InstallableUnit, Requirement, SelectionContext, UnitKey, Version, VersionRange,
};

/// A unit version as seen by `PubGrub`.
///
/// `bump` appends a NUL to the qualifier, which yields the immediate
/// successor under the qualifier's string ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitVersion(
    /// The underlying [`Version`].
    pub Version,
);

impl fmt::Display for UnitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.0.to_string();
        write!(f, "{}", rendered.trim_end_matches('\0').trim_end_matches('.'))
    }
}

impl pubgrub::version::Version for UnitVersion {
    fn lowest() -> Self {
        Self(Version::empty())
    }

    fn bump(&self) -> Self {
        let v = &self.0;
        Self(Version::with_qualifier(
            v.major(),
            v.minor(),
            v.micro(),
            format!("{}\0", v.qualifier()),
        ))
    }
}

/// How a requirement constrains the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    /// Must be met; may pull in any provider.
    Greedy,
    /// Met when possible; may be left unmet.
    Optional,
    /// Must be met by a provider that greedy requirements already reach.
    NonGreedy,
}

impl RequirementKind {
    /// The kind of `requirement` in `context`, or `None` when it imposes nothing.
    fn of(requirement: &Requirement, context: &SelectionContext) -> Option<Self> {
        if requirement.max == 0 || !requirement.is_applicable_in(context) {
            return None;
        }
        match (requirement.greedy, requirement.is_optional()) {
            (true, false) => Some(Self::Greedy),
            (true, true) => Some(Self::Optional),
            (false, false) => Some(Self::NonGreedy),
            (false, true) => None,
        }
    }
}

/// Identity of a requirement proxy. Filters are evaluated before a proxy is
/// created, so they are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequirementKey {
    namespace: String,
    name: String,
    range: VersionRange,
    kind: RequirementKind,
}

impl RequirementKey {
    fn new(requirement: &Requirement, kind: RequirementKind) -> Self {
        Self {
            namespace: requirement.namespace.clone(),
            name: requirement.name.clone(),
            range: requirement.range.clone(),
            kind,
        }
    }
}

/// A package in the `PubGrub` problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SolverPackage {
    /// The transient root unit.
    Root(String),
    /// All versions of a singleton unit id.
    Unit(String),
    /// One version of a non-singleton unit.
    Instance(UnitKey),
    /// The choice of provider for a requirement.
    Requirement(RequirementKey),
}

impl fmt::Display for SolverPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root(id) | Self::Unit(id) => write!(f, "{id}"),
            Self::Instance(key) => write!(f, "{key}"),
            Self::Requirement(key) => write!(f, "{} {} {}", key.namespace, key.name, key.range),
        }
    }
}

type Constraints = DependencyConstraints<SolverPackage, UnitVersion>;

/// Proxy version meaning "no provider". Providers are numbered from 1.
fn unmet() -> UnitVersion {
    UnitVersion(Version::empty())
}

/// Provides the unit graph of one solve request to `PubGrub`.
#[derive(Debug)]
pub struct UnitDependencyProvider<'a> {
    root: &'a InstallableUnit,
    context: &'a SelectionContext,
    units: HashMap<UnitKey, Arc<InstallableUnit>>,
    singletons: HashMap<String, Vec<Version>>,
    proxies: HashMap<RequirementKey, Vec<Arc<InstallableUnit>>>,
}

impl<'a> UnitDependencyProvider<'a> {
    /// Index `candidates` for solving `root` in `context`.
    pub fn new(root: &'a InstallableUnit, candidates: &UnitSet, context: &'a SelectionContext) -> Self {
        let usable: UnitSet = candidates
            .iter()
            .filter(|u| u.is_applicable_in(context))
            .cloned()
            .collect();
        let index = CapabilityIndex::build(&usable);

        let mut singletons: HashMap<String, Vec<Version>> = HashMap::new();
        for unit in usable.iter().filter(|u| u.singleton) {
            singletons
                .entry(unit.id.clone())
                .or_default()
                .push(unit.version.clone());
        }
        for versions in singletons.values_mut() {
            versions.sort_unstable_by(|a, b| b.cmp(a));
        }

        let reachable = Self::greedy_closure(root, &index, context);

        let mut proxies = HashMap::new();
        for unit in std::iter::once(root).chain(usable.iter().map(|u| &**u)) {
            for (requirement, kind) in Self::followed(unit, context) {
                proxies
                    .entry(RequirementKey::new(requirement, kind))
                    .or_insert_with(|| {
                        let mut providers = index.providers(requirement);
                        if kind == RequirementKind::NonGreedy {
                            providers.retain(|p| reachable.contains(&p.key()));
                        }
                        providers.sort_by(|a, b| {
                            a.version.cmp(&b.version).then_with(|| a.id.cmp(&b.id))
                        });
                        providers
                    });
            }
        }

        Self {
            root,
            context,
            units: usable.iter().map(|u| (u.key(), Arc::clone(u))).collect(),
            singletons,
            proxies,
        }
    }

    /// Requirements that constrain `unit` in `context`, with their kind.
    fn followed<'u>(
        unit: &'u InstallableUnit,
        context: &'u SelectionContext,
    ) -> impl Iterator<Item = (&'u Requirement, RequirementKind)> {
        unit.requirements
            .iter()
            .filter_map(move |r| RequirementKind::of(r, context).map(|kind| (r, kind)))
    }

    /// Units reachable from `root` through greedy requirements.
    fn greedy_closure(
        root: &InstallableUnit,
        index: &CapabilityIndex,
        context: &SelectionContext,
    ) -> HashSet<UnitKey> {
        let mut reachable = HashSet::new();
        let mut queue: VecDeque<Vec<Arc<InstallableUnit>>> = VecDeque::new();
        let greedy = |unit: &InstallableUnit| -> Vec<Arc<InstallableUnit>> {
            Self::followed(unit, context)
                .filter(|(_, kind)| *kind != RequirementKind::NonGreedy)
                .flat_map(|(requirement, _)| index.providers(requirement))
                .collect()
        };

        queue.push_back(greedy(root));
        while let Some(providers) = queue.pop_front() {
            for provider in providers {
                if reachable.insert(provider.key()) {
                    queue.push_back(greedy(&provider));
                }
            }
        }
        reachable
    }

    fn constraints_of(&self, unit: &InstallableUnit) -> Constraints {
        let mut deps = Constraints::default();
        for (requirement, kind) in Self::followed(unit, self.context) {
            deps.insert(
                SolverPackage::Requirement(RequirementKey::new(requirement, kind)),
                Range::any(),
            );
        }
        deps
    }

    fn unit_package(unit: &InstallableUnit) -> (SolverPackage, Range<UnitVersion>) {
        if unit.singleton {
            (
                SolverPackage::Unit(unit.id.clone()),
                Range::exact(UnitVersion(unit.version.clone())),
            )
        } else {
            (SolverPackage::Instance(unit.key()), Range::any())
        }
    }

    /// Versions offered for `package`, most preferred first.
    fn versions(&self, package: &SolverPackage) -> Vec<UnitVersion> {
        match package {
            SolverPackage::Root(_) => vec![UnitVersion(self.root.version.clone())],
            SolverPackage::Unit(id) => self
                .singletons
                .get(id)
                .into_iter()
                .flatten()
                .cloned()
                .map(UnitVersion)
                .collect(),
            SolverPackage::Instance(key) => {
                if self.units.contains_key(key) {
                    vec![UnitVersion(Version::empty())]
                } else {
                    Vec::new()
                }
            }
            SolverPackage::Requirement(key) => {
                let count = self.proxies.get(key).map_or(0, Vec::len);
                let mut versions: Vec<UnitVersion> = (1..=count)
                    .rev()
                    .filter_map(|i| u32::try_from(i).ok())
                    .map(|i| UnitVersion(Version::new(i, 0, 0)))
                    .collect();
                if key.kind == RequirementKind::Optional {
                    versions.push(unmet());
                }
                versions
            }
        }
    }

    /// The provider a proxy version stands for.
    fn provider(&self, key: &RequirementKey, version: &UnitVersion) -> Option<&Arc<InstallableUnit>> {
        let index = usize::try_from(version.0.major()).ok()?.checked_sub(1)?;
        self.proxies.get(key)?.get(index)
    }

    /// Map a `PubGrub` solution entry back to a unit.
    fn unit_for(&self, package: &SolverPackage, version: &UnitVersion) -> Option<Arc<InstallableUnit>> {
        match package {
            SolverPackage::Unit(id) => self
                .units
                .get(&UnitKey::new(id.clone(), version.0.clone()))
                .cloned(),
            SolverPackage::Instance(key) => self.units.get(key).cloned(),
            SolverPackage::Root(_) | SolverPackage::Requirement(_) => None,
        }
    }
}

impl DependencyProvider<SolverPackage, UnitVersion> for UnitDependencyProvider<'_> {
    fn choose_package_version<T: Borrow<SolverPackage>, U: Borrow<Range<UnitVersion>>>(
        &self,
        potential_packages: impl Iterator<Item = (T, U)>,
    ) -> Result<(T, Option<UnitVersion>), Box<dyn Error>> {
        Ok(choose_package_with_fewest_versions(
            |package: &SolverPackage| self.versions(package).into_iter(),
            potential_packages,
        ))
    }

    fn get_dependencies(
        &self,
        package: &SolverPackage,
        version: &UnitVersion,
    ) -> Result<Dependencies<SolverPackage, UnitVersion>, Box<dyn Error>> {
        let deps = match package {
            SolverPackage::Root(_) => self.constraints_of(self.root),
            SolverPackage::Unit(_) | SolverPackage::Instance(_) => {
                match self.unit_for(package, version) {
                    Some(unit) => self.constraints_of(&unit),
                    None => return Ok(Dependencies::Unknown),
                }
            }
            SolverPackage::Requirement(_) if *version == unmet() => Constraints::default(),
            SolverPackage::Requirement(key) => {
                let Some(provider) = self.provider(key, version) else {
                    return Ok(Dependencies::Unknown);
                };
                let (target, range) = Self::unit_package(provider);
                let mut deps = Constraints::default();
                deps.insert(target, range);
                deps
            }
        };
        Ok(Dependencies::Known(deps))
    }
}

/// The default [`Planner`], backed by the `PubGrub` version solver.
#[derive(Debug, Default, Clone, Copy)]
pub struct PubGrubPlanner;

impl PubGrubPlanner {
    /// Create a planner.
    pub fn new() -> Self {
        Self
    }
}

impl Planner for PubGrubPlanner {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<UnitSet, Unsatisfiable> {
        let mut candidates = request.candidates.clone();
        candidates.extend(request.installed.iter().cloned());

        let provider = UnitDependencyProvider::new(request.root, &candidates, request.context);
        let root = SolverPackage::Root(request.root.id.clone());
        let root_version = UnitVersion(request.root.version.clone());

        match pubgrub::solver::resolve(&provider, root, root_version) {
            Ok(solution) => {
                let units: UnitSet = solution
                    .iter()
                    .filter_map(|(package, version)| provider.unit_for(package, version))
                    .collect();
                tracing::debug!("Solution contains {} units", units.len());
                Ok(units)
            }
            Err(PubGrubError::NoSolution(mut tree)) => {
                tree.collapse_no_versions();
                Err(Unsatisfiable::new(DefaultStringReporter::report(&tree)))
            }
            Err(e) => Err(Unsatisfiable::new(format!("Resolution failed: {e}"))),
        }
    }
}
