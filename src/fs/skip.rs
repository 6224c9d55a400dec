//! Substring-based path exclusion

use std::path::Path;

/// Immutable set of skip substrings
///
/// A path containing any of the substrings is excluded, and since every
/// descendant path contains it too, so is everything beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    patterns: Vec<String>,
}

impl SkipSet {
    /// Build a skip set, ignoring empty patterns
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Does `path` contain any skip substring
    pub fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let text = path.to_string_lossy();
        self.patterns.iter().any(|p| text.contains(p.as_str()))
    }

    /// No patterns configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Configured patterns
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
