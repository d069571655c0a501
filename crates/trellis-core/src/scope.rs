//! Scope definitions for endpoint authorization.
//!
//! A scope is a named permission unit. Endpoints declare the scopes a
//! caller must hold; the auth provider resolves the scopes a session's
//! credentials actually grant.

use serde::Deserialize;
use serde::Serialize;

/// A named permission unit.
///
/// Scopes are opaque to the dispatch core: it only ever tests membership
/// of a required scope in the session's resolved set. Comparison is exact
/// and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Create a scope from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The scope name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_bare_name() {
        assert_eq!(Scope::new("admin").to_string(), "admin");
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert_ne!(Scope::new("admin"), Scope::new("Admin"));
    }

    #[test]
    fn serde_is_transparent() {
        let scope = Scope::new("ops:read");
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, "\"ops:read\"");
        let decoded: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, scope);
    }
}
