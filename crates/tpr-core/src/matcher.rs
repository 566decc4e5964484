//! Resolve symbolic unit references against a unit space.

use crate::error::ResolutionError;
use crate::space::UnitSource;
use std::sync::Arc;
use tpr_schema::{InstallableUnit, UnitReference, Version};

/// Find the unit a reference points at.
///
/// `0.0.0` selects the latest version of the id; any other version selects
/// that exact version. Both go through the latest-match query so identical
/// duplicates collapse to one unit.
///
/// # Errors
///
/// Returns [`ResolutionError::InvalidVersion`] if the version string does not
/// parse and [`ResolutionError::UnitNotFound`] if nothing matches.
pub fn find_unit(
    space: &dyn UnitSource,
    reference: &UnitReference,
) -> Result<Arc<InstallableUnit>, ResolutionError> {
    let version =
        Version::parse(&reference.version).map_err(|source| ResolutionError::InvalidVersion {
            id: reference.id.clone(),
            version: reference.version.clone(),
            source,
        })?;

    let constraint = (!version.is_empty()).then_some(&version);
    space
        .query_latest(&reference.id, constraint)
        .ok_or_else(|| ResolutionError::UnitNotFound {
            id: reference.id.clone(),
            version: reference.version.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::UnitSet;
    use crate::space::tests::unit;

    fn space() -> UnitSet {
        [unit("a", "1.0"), unit("a", "2.0"), unit("b", "1.0.0.v2024")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_any_version_selects_latest() {
        let found = find_unit(&space(), &UnitReference::latest("a")).unwrap();
        assert_eq!(found.version, Version::new(2, 0, 0));
    }

    #[test]
    fn test_exact_version() {
        let found = find_unit(&space(), &UnitReference::new("a", "1.0.0")).unwrap();
        assert_eq!(found.version, Version::new(1, 0, 0));

        let found = find_unit(&space(), &UnitReference::new("b", "1.0.0.v2024")).unwrap();
        assert_eq!(found.version.qualifier(), "v2024");
    }

    #[test]
    fn test_missing_unit() {
        let err = find_unit(&space(), &UnitReference::new("a", "3.0.0")).unwrap_err();
        assert!(matches!(err, ResolutionError::UnitNotFound { ref id, .. } if id == "a"));
        assert_eq!(
            err.to_string(),
            "Unit a/3.0.0 is not contained in the repositories in the same location"
        );

        let err = find_unit(&space(), &UnitReference::latest("zzz")).unwrap_err();
        assert!(matches!(err, ResolutionError::UnitNotFound { .. }));
    }

    #[test]
    fn test_invalid_version() {
        let err = find_unit(&space(), &UnitReference::new("a", "one.two")).unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidVersion { .. }));
        assert_eq!(err.to_string(), "Cannot parse version \"one.two\" of unit \"a\"");
    }
}
