//! Applicability rules deciding which requirements the slicer follows.
//!
//! A [`SlicingPolicy`] is a base rule plus an ordered list of override
//! [`ApplicabilityRule`]s. Each override may decide a requirement or defer
//! by returning `None`; the first decision wins and the base rule handles
//! everything no override claimed.

use serde::{Deserialize, Serialize};
use std::fmt;
use tpr_schema::{InstallableUnit, Requirement, SelectionContext};

/// Caller-tunable flags of the permissive slicing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicingOptions {
    /// Filter context. Filters are only evaluated when it has more than one entry.
    pub filter: SelectionContext,
    /// Follow requirements with `min = 0`.
    pub include_optional_dependencies: bool,
    /// Treat every requirement as greedy.
    pub everything_greedy: bool,
    /// Outcome for filtered requirements and units when filters are not evaluated.
    pub force_filter_to: bool,
    /// Only follow requirements pinned to a single version.
    pub strict_dependency_only: bool,
    /// Only follow requirements that carry a filter.
    pub filtered_requirements_only: bool,
}

impl Default for SlicingOptions {
    fn default() -> Self {
        Self {
            filter: SelectionContext::new(),
            include_optional_dependencies: true,
            everything_greedy: true,
            force_filter_to: true,
            strict_dependency_only: false,
            filtered_requirements_only: false,
        }
    }
}

impl SlicingOptions {
    /// True when the filter context is rich enough to evaluate filters against.
    pub fn considers_filter(&self) -> bool {
        !self.filter.is_trivial()
    }
}

/// A refinement of requirement applicability.
pub trait ApplicabilityRule: Send + Sync + fmt::Debug {
    /// Decide whether `requirement` of `unit` is followed, or `None` to defer.
    fn is_applicable(&self, unit: &InstallableUnit, requirement: &Requirement) -> Option<bool>;
}

/// Special handling for a group unit's requirements on its members.
///
/// Only requirements in the unit namespace declared by group units are
/// decided here; everything else defers to the next rule.
#[derive(Debug, Clone)]
pub struct GroupMembershipRule {
    options: SlicingOptions,
}

impl GroupMembershipRule {
    /// Build the rule from the mirror's slicing options.
    pub fn new(options: SlicingOptions) -> Self {
        Self { options }
    }
}

impl ApplicabilityRule for GroupMembershipRule {
    fn is_applicable(&self, unit: &InstallableUnit, requirement: &Requirement) -> Option<bool> {
        if !unit.is_group() || !requirement.is_unit_requirement() {
            return None;
        }
        let options = &self.options;
        if !options.include_optional_dependencies && requirement.is_optional() {
            return Some(false);
        }
        if options.filtered_requirements_only && requirement.filter.is_none() {
            return Some(false);
        }
        Some(!options.considers_filter() || requirement.is_applicable_in(&options.filter))
    }
}

#[derive(Debug, Clone)]
enum BaseRule {
    /// Evaluate every filter against the context; follow greedy requirements only.
    Strict(SelectionContext),
    /// The permissive rule tuned by options.
    Permissive(SlicingOptions),
}

/// Base rule plus overrides.
#[derive(Debug)]
pub struct SlicingPolicy {
    base: BaseRule,
    overrides: Vec<Box<dyn ApplicabilityRule>>,
}

impl SlicingPolicy {
    /// The rule used when resolving a target environment.
    pub fn strict(context: SelectionContext) -> Self {
        Self {
            base: BaseRule::Strict(context),
            overrides: Vec::new(),
        }
    }

    /// The permissive rule without overrides.
    pub fn permissive(options: SlicingOptions) -> Self {
        Self {
            base: BaseRule::Permissive(options),
            overrides: Vec::new(),
        }
    }

    /// The permissive rule with group-membership handling, as used when mirroring.
    pub fn for_mirroring(options: SlicingOptions) -> Self {
        let rule = GroupMembershipRule::new(options.clone());
        Self::permissive(options).with_override(rule)
    }

    /// Append an override. Earlier overrides take precedence.
    pub fn with_override(mut self, rule: impl ApplicabilityRule + 'static) -> Self {
        self.overrides.push(Box::new(rule));
        self
    }

    /// The context filters are evaluated against, if any.
    pub fn context(&self) -> Option<&SelectionContext> {
        match &self.base {
            BaseRule::Strict(context) => Some(context),
            BaseRule::Permissive(options) if options.considers_filter() => Some(&options.filter),
            BaseRule::Permissive(_) => None,
        }
    }

    /// Whether `unit` may enter a slice at all.
    pub fn includes_unit(&self, unit: &InstallableUnit) -> bool {
        match &self.base {
            BaseRule::Strict(context) => unit.is_applicable_in(context),
            BaseRule::Permissive(options) => {
                if options.considers_filter() {
                    unit.is_applicable_in(&options.filter)
                } else {
                    unit.filter.is_none() || options.force_filter_to
                }
            }
        }
    }

    /// Whether the slicer follows `requirement` of `unit`.
    pub fn is_applicable(&self, unit: &InstallableUnit, requirement: &Requirement) -> bool {
        self.overrides
            .iter()
            .find_map(|rule| rule.is_applicable(unit, requirement))
            .unwrap_or_else(|| self.base_applicable(requirement))
    }

    /// Whether the slicer expands `requirement` into its providers.
    pub fn is_greedy(&self, requirement: &Requirement) -> bool {
        match &self.base {
            BaseRule::Strict(_) => requirement.greedy,
            BaseRule::Permissive(options) => options.everything_greedy || requirement.greedy,
        }
    }

    fn base_applicable(&self, requirement: &Requirement) -> bool {
        let options = match &self.base {
            BaseRule::Strict(context) => return requirement.is_applicable_in(context),
            BaseRule::Permissive(options) => options,
        };
        if options.strict_dependency_only && !requirement.range.is_exact() {
            return false;
        }
        let unfiltered = requirement.filter.is_none();
        if options.filtered_requirements_only && unfiltered {
            return false;
        }
        if !options.include_optional_dependencies && requirement.is_optional() {
            return false;
        }
        if options.considers_filter() {
            requirement.is_applicable_in(&options.filter)
        } else {
            unfiltered || options.force_filter_to
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::tests::unit;
    use tpr_schema::{Filter, Version, VersionRange};

    fn linux() -> SelectionContext {
        [("osgi.os", "linux"), ("osgi.ws", "gtk"), ("osgi.arch", "x86_64")]
            .into_iter()
            .collect()
    }

    fn member() -> Requirement {
        Requirement::unit("member", VersionRange::exact(Version::new(1, 0, 0)))
    }

    fn win32_only() -> Filter {
        Filter::equal("osgi.os", "win32")
    }

    #[test]
    fn test_slicing_option_defaults() {
        let options = SlicingOptions::default();
        assert!(options.include_optional_dependencies);
        assert!(options.everything_greedy);
        assert!(options.force_filter_to);
        assert!(!options.strict_dependency_only);
        assert!(!options.filtered_requirements_only);
        assert!(!options.considers_filter());
    }

    #[test]
    fn test_slicing_options_partial_document() {
        let options: SlicingOptions = serde_json::from_str(
            r#"{"include_optional_dependencies": false, "filter": {"osgi.os": "linux", "osgi.ws": "gtk"}}"#,
        )
        .unwrap();
        assert!(!options.include_optional_dependencies);
        assert!(options.everything_greedy);
        assert!(options.considers_filter());
    }

    #[test]
    fn test_group_rule_defers_for_non_groups() {
        let rule = GroupMembershipRule::new(SlicingOptions::default());
        assert_eq!(rule.is_applicable(&unit("plain", "1.0"), &member()), None);

        let capability = Requirement::new("java.package", "org.example", VersionRange::any());
        assert_eq!(
            rule.is_applicable(&unit("g", "1.0").as_group(), &capability),
            None
        );
    }

    #[test]
    fn test_group_rule_optional_members() {
        let group = unit("g", "1.0").as_group();
        let optional = member().optional();

        let excluding = GroupMembershipRule::new(SlicingOptions {
            include_optional_dependencies: false,
            ..SlicingOptions::default()
        });
        assert_eq!(excluding.is_applicable(&group, &optional), Some(false));
        assert_eq!(excluding.is_applicable(&group, &member()), Some(true));

        let including = GroupMembershipRule::new(SlicingOptions::default());
        assert_eq!(including.is_applicable(&group, &optional), Some(true));
    }

    #[test]
    fn test_group_rule_filters() {
        let group = unit("g", "1.0").as_group();
        let filtered = member().with_filter(win32_only());

        let with_context = GroupMembershipRule::new(SlicingOptions {
            filter: linux(),
            ..SlicingOptions::default()
        });
        assert_eq!(with_context.is_applicable(&group, &filtered), Some(false));
        assert_eq!(with_context.is_applicable(&group, &member()), Some(true));

        let filtered_only = GroupMembershipRule::new(SlicingOptions {
            filter: linux(),
            filtered_requirements_only: true,
            ..SlicingOptions::default()
        });
        assert_eq!(filtered_only.is_applicable(&group, &member()), Some(false));

        let no_context = GroupMembershipRule::new(SlicingOptions {
            filtered_requirements_only: true,
            force_filter_to: false,
            ..SlicingOptions::default()
        });
        assert_eq!(no_context.is_applicable(&group, &member()), Some(false));
        // Without a context every filtered membership is followed.
        assert_eq!(no_context.is_applicable(&group, &filtered), Some(true));
    }

    #[test]
    fn test_permissive_base_rule() {
        let owner = unit("owner", "1.0");
        let policy = SlicingPolicy::permissive(SlicingOptions {
            strict_dependency_only: true,
            ..SlicingOptions::default()
        });
        let ranged = Requirement::unit("x", VersionRange::at_least(Version::new(1, 0, 0)));
        assert!(!policy.is_applicable(&owner, &ranged));
        assert!(policy.is_applicable(&owner, &member()));

        let forced_off = SlicingPolicy::permissive(SlicingOptions {
            force_filter_to: false,
            ..SlicingOptions::default()
        });
        assert!(!forced_off.is_applicable(&owner, &member().with_filter(win32_only())));
        assert!(forced_off.is_applicable(&owner, &member()));
        assert!(!forced_off.includes_unit(&unit("w", "1.0").with_filter(win32_only())));
        assert!(forced_off.context().is_none());

        let evaluated = SlicingPolicy::permissive(SlicingOptions {
            filter: linux(),
            ..SlicingOptions::default()
        });
        assert!(!evaluated.is_applicable(&owner, &member().with_filter(win32_only())));
        assert!(!evaluated.includes_unit(&unit("w", "1.0").with_filter(win32_only())));
        assert!(evaluated.is_greedy(&member().with_greedy(false)));
    }

    #[test]
    fn test_strict_rule() {
        let policy = SlicingPolicy::strict(linux());
        let owner = unit("owner", "1.0");
        assert!(policy.is_applicable(&owner, &member()));
        assert!(policy.is_applicable(&owner, &member().optional()));
        assert!(!policy.is_applicable(&owner, &member().with_filter(win32_only())));
        assert!(!policy.is_greedy(&member().with_greedy(false)));
        assert!(policy.includes_unit(&unit("l", "1.0").with_filter(Filter::equal("osgi.os", "linux"))));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let options = SlicingOptions {
            include_optional_dependencies: false,
            ..SlicingOptions::default()
        };
        let group = unit("g", "1.0").as_group();
        let plain = unit("p", "1.0");
        let optional = member().optional();

        let policy = SlicingPolicy::for_mirroring(options);
        assert!(!policy.is_applicable(&group, &optional));
        assert!(!policy.is_applicable(&plain, &optional));

        let permissive_with_include = SlicingPolicy::for_mirroring(SlicingOptions::default());
        assert!(permissive_with_include.is_applicable(&group, &optional));
    }
}
