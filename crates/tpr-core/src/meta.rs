//! Transient root units used to pose "install exactly these roots" to a planner.

use std::sync::atomic::{AtomicU64, Ordering};
use tpr_schema::{InstallableUnit, Requirement, UNBOUNDED, Version, VersionRange};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Build a throwaway unit that requires every seed at its exact version.
///
/// The id and version derive from the current time plus a process-wide
/// counter, so two calls never produce the same identity. The unit is never
/// stored in a repository.
pub fn create_meta_unit<'a>(seeds: impl IntoIterator<Item = &'a InstallableUnit>) -> InstallableUnit {
    let millis = chrono::Utc::now().timestamp_millis();
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let stamp = format!("{millis}-{sequence}");

    let mut meta = InstallableUnit::new(
        format!("tpr.meta.{stamp}"),
        Version::with_qualifier(0, 0, 0, stamp),
    );
    for seed in seeds {
        let max = if seed.singleton { 1 } else { UNBOUNDED };
        let mut requirement = Requirement::unit(&seed.id, VersionRange::exact(seed.version.clone()))
            .with_cardinality(1, max)
            .with_greedy(true);
        requirement.filter.clone_from(&seed.filter);
        meta = meta.with_requirement(requirement);
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::tests::unit;
    use tpr_schema::{Filter, SelectionContext};

    #[test]
    fn test_requirements_pin_seeds() {
        let seeds = [
            unit("app", "1.2.3").with_singleton(true),
            unit("lib", "2.0").with_filter(Filter::equal("osgi.os", "linux")),
        ];
        let meta = create_meta_unit(&seeds);
        assert_eq!(meta.requirements.len(), 2);

        let app = &meta.requirements[0];
        assert_eq!(app.name, "app");
        assert!(app.is_unit_requirement());
        assert!(app.range.is_exact());
        assert!(app.range.contains(&Version::new(1, 2, 3)));
        assert!(!app.range.contains(&Version::with_qualifier(1, 2, 3, "x")));
        assert_eq!((app.min, app.max), (1, 1));
        assert!(app.greedy);

        let lib = &meta.requirements[1];
        assert_eq!(lib.max, UNBOUNDED);
        assert!(!lib.is_applicable_in(&SelectionContext::new()));
    }

    #[test]
    fn test_identity_is_unique_per_call() {
        let first = create_meta_unit(&[]);
        let second = create_meta_unit(&[]);
        assert_ne!(first.key(), second.key());
        assert!(first.requirements.is_empty());
    }
}
