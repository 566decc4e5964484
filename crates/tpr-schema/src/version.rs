//! OSGi-style versions and version ranges.
//!
//! A version has three numeric segments and an optional string qualifier
//! (`1.2.3.v20240101`). Missing numeric segments default to zero and an
//! empty qualifier sorts before any non-empty one. `0.0.0` is the empty
//! version, which unit references use to mean "any version".

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing versions and ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// A numeric segment was not a non-negative integer.
    #[error("invalid numeric segment '{segment}' in version '{input}'")]
    InvalidSegment {
        /// The full input string.
        input: String,
        /// The offending segment.
        segment: String,
    },

    /// The qualifier contained characters outside `[A-Za-z0-9_-]`.
    #[error("invalid qualifier '{qualifier}' in version '{input}'")]
    InvalidQualifier {
        /// The full input string.
        input: String,
        /// The offending qualifier.
        qualifier: String,
    },

    /// A range was not of the form `[a,b]`, `(a,b)` or a bare version.
    #[error("malformed version range '{0}'")]
    MalformedRange(String),

    /// The lower bound of a range is above its upper bound.
    #[error("empty version range '{0}'")]
    EmptyRange(String),
}

/// A structured, totally ordered unit version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: String,
}

impl Version {
    /// Create a version without a qualifier.
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Create a version with a qualifier.
    ///
    /// The qualifier is stored as-is; use [`Version::parse`] for validated input.
    pub fn with_qualifier(major: u32, minor: u32, micro: u32, qualifier: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: qualifier.into(),
        }
    }

    /// The empty version `0.0.0`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true for `0.0.0` without a qualifier.
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// Parse a version string. An empty (or blank) string yields `0.0.0`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if a numeric segment is not an integer or the
    /// qualifier contains illegal characters.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }

        let mut parts = trimmed.splitn(4, '.');
        let mut numbers = [0u32; 3];
        for slot in &mut numbers {
            match parts.next() {
                Some(segment) => {
                    *slot = segment.parse().map_err(|_| VersionError::InvalidSegment {
                        input: input.to_string(),
                        segment: segment.to_string(),
                    })?;
                }
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default();
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(VersionError::InvalidQualifier {
                input: input.to_string(),
                qualifier: qualifier.to_string(),
            });
        }

        let [major, minor, micro] = numbers;
        Ok(Self::with_qualifier(major, minor, micro, qualifier))
    }

    /// Major segment.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Minor segment.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Micro segment.
    pub fn micro(&self) -> u32 {
        self.micro
    }

    /// Qualifier, empty when absent.
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

/// An interval of versions with inclusive or exclusive bounds.
///
/// The bare form `1.0` means "1.0 or higher"; `[1.0,2.0)` is the usual
/// half-open compatibility range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    minimum: Version,
    include_minimum: bool,
    maximum: Option<Version>,
    include_maximum: bool,
}

impl VersionRange {
    /// Every version: `0.0.0` and above.
    pub fn any() -> Self {
        Self::at_least(Version::empty())
    }

    /// `version` and above.
    pub fn at_least(version: Version) -> Self {
        Self {
            minimum: version,
            include_minimum: true,
            maximum: None,
            include_maximum: false,
        }
    }

    /// Exactly `version`, i.e. `[version,version]`.
    pub fn exact(version: Version) -> Self {
        Self {
            minimum: version.clone(),
            include_minimum: true,
            maximum: Some(version),
            include_maximum: true,
        }
    }

    /// A bounded range.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::EmptyRange`] if no version can satisfy the bounds.
    pub fn between(
        minimum: Version,
        include_minimum: bool,
        maximum: Version,
        include_maximum: bool,
    ) -> Result<Self, VersionError> {
        let range = Self {
            minimum,
            include_minimum,
            maximum: Some(maximum),
            include_maximum,
        };
        if range.is_empty() {
            return Err(VersionError::EmptyRange(range.to_string()));
        }
        Ok(range)
    }

    /// Parse a range in interval or bare-version notation.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] for malformed brackets, bad versions or empty ranges.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let Some(first) = trimmed.chars().next() else {
            return Ok(Self::any());
        };
        if first != '[' && first != '(' {
            return Ok(Self::at_least(Version::parse(trimmed)?));
        }

        let last = trimmed
            .chars()
            .last()
            .filter(|c| *c == ']' || *c == ')')
            .ok_or_else(|| VersionError::MalformedRange(input.to_string()))?;
        let body = &trimmed[1..trimmed.len() - 1];
        let (low, high) = body
            .split_once(',')
            .ok_or_else(|| VersionError::MalformedRange(input.to_string()))?;

        Self::between(
            Version::parse(low)?,
            first == '[',
            Version::parse(high)?,
            last == ']',
        )
    }

    /// Lower bound.
    pub fn minimum(&self) -> &Version {
        &self.minimum
    }

    /// Whether the lower bound is inclusive.
    pub fn include_minimum(&self) -> bool {
        self.include_minimum
    }

    /// Upper bound, `None` when unbounded.
    pub fn maximum(&self) -> Option<&Version> {
        self.maximum.as_ref()
    }

    /// Whether the upper bound is inclusive.
    pub fn include_maximum(&self) -> bool {
        self.include_maximum
    }

    /// True when the range admits exactly one version.
    pub fn is_exact(&self) -> bool {
        self.include_minimum && self.include_maximum && self.maximum.as_ref() == Some(&self.minimum)
    }

    /// Check whether `version` lies inside the range.
    pub fn contains(&self, version: &Version) -> bool {
        let above = if self.include_minimum {
            *version >= self.minimum
        } else {
            *version > self.minimum
        };
        let below = match &self.maximum {
            None => true,
            Some(max) if self.include_maximum => version <= max,
            Some(max) => version < max,
        };
        above && below
    }

    fn is_empty(&self) -> bool {
        match &self.maximum {
            None => false,
            Some(max) => match self.minimum.cmp(max) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.include_minimum && self.include_maximum),
                Ordering::Less => false,
            },
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.maximum {
            None if self.include_minimum => write!(f, "{}", self.minimum),
            None => write!(f, "({},)", self.minimum),
            Some(max) => write!(
                f,
                "{}{},{}{}",
                if self.include_minimum { '[' } else { '(' },
                self.minimum,
                max,
                if self.include_maximum { ']' } else { ')' }
            ),
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VersionRange> for String {
    fn from(r: VersionRange) -> Self {
        r.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_fills_missing_segments() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("1.2.3.v2024").qualifier(), "v2024");
        assert_eq!(v("1.2.3.v2024").to_string(), "1.2.3.v2024");
    }

    #[test]
    fn test_empty_version() {
        assert!(v("0.0.0").is_empty());
        assert!(v("").is_empty());
        assert!(!v("0.0.0.q").is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Version::parse("1.x"),
            Err(VersionError::InvalidSegment { .. })
        ));
        assert!(matches!(
            Version::parse("1.0.0.bad qualifier"),
            Err(VersionError::InvalidQualifier { .. })
        ));
    }

    #[test]
    fn test_ordering() {
        assert!(v("1.0.0") < v("1.0.0.a"));
        assert!(v("1.0.0.a") < v("1.0.0.b"));
        assert!(v("1.9.9") < v("1.10.0"));
        assert!(v("2.0") > v("1.99.99.zzz"));
    }

    #[test]
    fn test_range_parse_and_contains() {
        let r = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(r.contains(&v("1.0")));
        assert!(r.contains(&v("1.5.3.q")));
        assert!(!r.contains(&v("2.0")));

        let open = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!open.contains(&v("1.0")));
        assert!(open.contains(&v("2.0")));

        let bare = VersionRange::parse("1.5").unwrap();
        assert!(bare.contains(&v("99.0")));
        assert!(!bare.contains(&v("1.4")));
    }

    #[test]
    fn test_exact_range() {
        let r = VersionRange::exact(v("1.0.0"));
        assert!(r.is_exact());
        assert_eq!(r.to_string(), "[1.0.0,1.0.0]");
        assert!(!r.contains(&v("1.0.0.a")));
        assert!(!VersionRange::any().is_exact());
    }

    #[test]
    fn test_malformed_ranges() {
        assert!(matches!(
            VersionRange::parse("[1.0"),
            Err(VersionError::MalformedRange(_))
        ));
        assert!(matches!(
            VersionRange::parse("[2.0,1.0]"),
            Err(VersionError::EmptyRange(_))
        ));
        assert!(matches!(
            VersionRange::parse("[1.0,1.0)"),
            Err(VersionError::EmptyRange(_))
        ));
    }

    #[test]
    fn test_range_display_roundtrips() {
        for s in ["[1.0.0,2.0.0)", "(1.0.0,1.5.0]", "3.0.0"] {
            assert_eq!(VersionRange::parse(s).unwrap().to_string(), s);
        }
    }
}
