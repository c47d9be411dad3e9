//! Version-derived store names.

use std::fmt;

/// Name of the store owned by one deployment version: `"<prefix>-<version>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreName {
    prefix: String,
    version: String,
}

impl StoreName {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), version: version.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether `name` belongs to this application, whatever its version.
    pub fn shares_prefix(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Whether `name` is a store of this application left over from another version.
    pub fn is_stale(&self, name: &str) -> bool {
        self.shares_prefix(name) && name != self.to_string()
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(StoreName::new("app", "v1").to_string(), "app-v1");
    }

    #[test]
    fn test_is_stale() {
        let current = StoreName::new("app", "v2");
        assert!(current.is_stale("app-v1"));
        assert!(!current.is_stale("app-v2"));
        assert!(!current.is_stale("other-v1"));
    }

    #[test]
    fn test_prefix_requires_separator() {
        let current = StoreName::new("app", "v2");
        assert!(!current.shares_prefix("application-v1"));
        assert!(!current.shares_prefix("app"));
        assert!(current.shares_prefix("app-"));
    }
}
