//! Space-delimited OAuth scope sets.

use serde::{Deserialize, Serialize};

/// An ordered, duplicate-free set of scope names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scopes(Vec<String>);

impl Scopes {
    /// Parses a space-delimited scope string. Blank input yields an empty set.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self::from_iter(value.split_whitespace())
    }

    /// Returns `true` if there are no scopes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if `scope` is in the set.
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }

    /// Scopes present in both sets, in the order of `self`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|s| other.contains(s))
                .cloned()
                .collect(),
        )
    }

    /// Returns `true` if every scope of `other` is in `self`.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other.0.iter().all(|s| self.contains(s))
    }

    /// Iterates over the scope names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Joins the scopes with single spaces.
    #[must_use]
    pub fn join(&self) -> String {
        self.0.join(" ")
    }

    /// Returns the scope names.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Scopes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut scopes: Vec<String> = Vec::new();
        for scope in iter {
            let scope = scope.into();
            if !scope.is_empty() && !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Self(scopes)
    }
}

impl std::fmt::Display for Scopes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.join())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dedups_and_keeps_order() {
        let scopes = Scopes::parse("  write read  write openid ");
        assert_eq!(scopes.as_slice(), ["write", "read", "openid"]);
        assert_eq!(scopes.join(), "write read openid");
        assert!(Scopes::parse("   ").is_empty());
    }

    #[test]
    fn test_intersect() {
        let requested = Scopes::parse("read admin write");
        let allowed = Scopes::parse("write read");
        assert_eq!(requested.intersect(&allowed).join(), "read write");
        assert!(Scopes::parse("admin").intersect(&allowed).is_empty());
    }

    #[test]
    fn test_covers() {
        let granted = Scopes::parse("read write");
        assert!(granted.covers(&Scopes::parse("read")));
        assert!(granted.covers(&Scopes::default()));
        assert!(!granted.covers(&Scopes::parse("read delete")));
    }
}
