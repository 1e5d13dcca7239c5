//! Freeze and whitelist-filter rules expressible in config files.

use serde::{Deserialize, Serialize};

/// A freeze condition. Any matching rule freezes the accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FreezeRule {
    /// Freeze after `at_least` recorded samples.
    InstanceCount { at_least: u64 },

    /// Freeze once the accumulator is `at_least` days old.
    AgeDays { at_least: u64 },

    /// Freeze after `at_least` distinct properties have been seen.
    PropertyCount { at_least: u64 },
}

/// A keep/drop rule applied to ranked whitelist candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterRule {
    /// Drop paths matching any pattern.
    Exclude { patterns: Vec<String> },

    /// Keep only paths matching at least one pattern.
    Include { patterns: Vec<String> },

    /// Drop paths seen fewer than `at_least` times.
    MinCount { at_least: u64 },

    /// Drop paths with more than `depth` dotted segments.
    MaxDepth { depth: usize },
}

impl FilterRule {
    /// Whether a candidate survives this rule.
    pub fn allows(&self, path: &str, count: u64) -> bool {
        match self {
            FilterRule::Exclude { patterns } => {
                !patterns.iter().any(|p| matches_pattern(p, path))
            }
            FilterRule::Include { patterns } => {
                patterns.iter().any(|p| matches_pattern(p, path))
            }
            FilterRule::MinCount { at_least } => count >= *at_least,
            FilterRule::MaxDepth { depth } => path.split('.').count() <= *depth,
        }
    }
}

/// Pattern matching supporting `*` (any), trailing `*`/`%` (prefix) and
/// leading `*` (suffix).
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('%') {
        return value.starts_with(prefix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return value.ends_with(suffix);
    }
    pattern == value
}
