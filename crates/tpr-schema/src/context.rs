//! Execution environments and the selection contexts built from them.
//!
//! # Example
//!
//! ```
//! use tpr_schema::{SelectionContext, TargetEnvironment};
//!
//! let env: TargetEnvironment = "linux/gtk/x86_64".parse().unwrap();
//! let ctx = SelectionContext::from_environment(&env);
//! assert_eq!(ctx.get("osgi.os"), Some("linux"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Context key for the operating system.
pub const PROP_OS: &str = "osgi.os";
/// Context key for the windowing system.
pub const PROP_WS: &str = "osgi.ws";
/// Context key for the processor architecture.
pub const PROP_ARCH: &str = "osgi.arch";
/// Context key for the language/locale.
pub const PROP_NL: &str = "osgi.nl";
/// Always-present context key enabling feature installation.
pub const PROP_INSTALL_FEATURES: &str = "org.eclipse.update.install.features";

/// A target execution environment (os/ws/arch plus optional locale and extras).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetEnvironment {
    /// Operating system, e.g. `linux`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Windowing system, e.g. `gtk`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws: Option<String>,
    /// Architecture, e.g. `x86_64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Language, e.g. `en_US`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nl: Option<String>,
    /// Additional context properties copied verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl TargetEnvironment {
    /// Create an environment from the os/ws/arch triple.
    pub fn new(os: &str, ws: &str, arch: &str) -> Self {
        Self {
            os: Some(os.to_string()),
            ws: Some(ws.to_string()),
            arch: Some(arch.to_string()),
            ..Self::default()
        }
    }
}

impl fmt::Display for TargetEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |p: &Option<String>| p.clone().unwrap_or_else(|| "*".to_string());
        write!(f, "{}/{}/{}", part(&self.os), part(&self.ws), part(&self.arch))?;
        if let Some(nl) = &self.nl {
            write!(f, "/{nl}")?;
        }
        Ok(())
    }
}

impl FromStr for TargetEnvironment {
    type Err = String;

    /// Parses `os/ws/arch[/nl]`; `*` leaves a segment unset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(format!(
                "Invalid environment '{s}': expected 'os/ws/arch' or 'os/ws/arch/nl'"
            ));
        }
        let segment = |p: &str| (!p.is_empty() && p != "*").then(|| p.to_string());
        Ok(Self {
            os: segment(parts[0]),
            ws: segment(parts[1]),
            arch: segment(parts[2]),
            nl: parts.get(3).copied().and_then(segment),
            properties: BTreeMap::new(),
        })
    }
}

/// Key-value data against which filters are evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionContext(BTreeMap<String, String>);

impl SelectionContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context used to resolve for `env`.
    ///
    /// Extra properties are copied first, the `osgi.*` keys override them and
    /// the feature-install flag is added unless already present.
    pub fn from_environment(env: &TargetEnvironment) -> Self {
        let mut map = env.properties.clone();
        for (key, value) in [
            (PROP_OS, &env.os),
            (PROP_WS, &env.ws),
            (PROP_ARCH, &env.arch),
            (PROP_NL, &env.nl),
        ] {
            if let Some(value) = value {
                map.insert(key.to_string(), value.clone());
            }
        }
        map.entry(PROP_INSTALL_FEATURES.to_string())
            .or_insert_with(|| "true".to_string());
        Self(map)
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set a key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A context with at most one entry carries no real platform information.
    pub fn is_trivial(&self) -> bool {
        self.0.len() <= 1
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for SelectionContext {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SelectionContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        let env: TargetEnvironment = "win32/win32/x86_64".parse().unwrap();
        assert_eq!(env.os.as_deref(), Some("win32"));
        assert_eq!(env.arch.as_deref(), Some("x86_64"));
        assert_eq!(env.nl, None);

        let partial: TargetEnvironment = "linux/*/aarch64/de".parse().unwrap();
        assert_eq!(partial.ws, None);
        assert_eq!(partial.nl.as_deref(), Some("de"));
        assert_eq!(partial.to_string(), "linux/*/aarch64/de");

        assert!("linux/gtk".parse::<TargetEnvironment>().is_err());
    }

    #[test]
    fn test_context_from_environment() {
        let mut env = TargetEnvironment::new("macosx", "cocoa", "aarch64");
        env.properties
            .insert(PROP_OS.to_string(), "overridden".to_string());
        env.properties
            .insert("custom".to_string(), "value".to_string());

        let ctx = SelectionContext::from_environment(&env);
        assert_eq!(ctx.get(PROP_OS), Some("macosx"));
        assert_eq!(ctx.get(PROP_WS), Some("cocoa"));
        assert_eq!(ctx.get("custom"), Some("value"));
        assert_eq!(ctx.get(PROP_INSTALL_FEATURES), Some("true"));
        assert_eq!(ctx.get(PROP_NL), None);
    }

    #[test]
    fn test_empty_environment_is_trivial() {
        let ctx = SelectionContext::from_environment(&TargetEnvironment::default());
        assert_eq!(ctx.len(), 1);
        assert!(ctx.is_trivial());
        assert!(SelectionContext::new().is_trivial());
    }

    #[test]
    fn test_install_features_flag_not_overridden() {
        let mut env = TargetEnvironment::default();
        env.properties
            .insert(PROP_INSTALL_FEATURES.to_string(), "false".to_string());
        let ctx = SelectionContext::from_environment(&env);
        assert_eq!(ctx.get(PROP_INSTALL_FEATURES), Some("false"));
    }
}
