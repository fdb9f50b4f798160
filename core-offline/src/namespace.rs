//! Cache namespace identity.
//!
//! A namespace is one generation of the cache. The current one is fixed when
//! the controller is built; every other namespace in the store is stale.

use core_runtime::config::OfflineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// The namespace `config` reads and writes, `"{prefix}-{version}"`.
    pub fn current(config: &OfflineConfig) -> Self {
        Self(config.namespace())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names in `existing` that are not this namespace, in their original
    /// order.
    pub fn stale_among<'a>(&self, existing: &'a [String]) -> Vec<&'a str> {
        existing
            .iter()
            .map(String::as_str)
            .filter(|name| *name != self.0)
            .collect()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Namespace {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_among_excludes_current() {
        let current = Namespace::from("shell-v2");
        let existing = vec![
            "shell-v1".to_string(),
            "shell-v2".to_string(),
            "unrelated".to_string(),
        ];

        assert_eq!(current.stale_among(&existing), vec!["shell-v1", "unrelated"]);
    }

    #[test]
    fn test_stale_among_only_current() {
        let current = Namespace::from("shell-v1");
        assert!(current.stale_among(&["shell-v1".to_string()]).is_empty());
        assert!(current.stale_among(&[]).is_empty());
    }
}
