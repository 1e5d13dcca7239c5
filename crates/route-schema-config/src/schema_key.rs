use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three payload parts learned per route.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKey {
    /// Query string parameters of the request.
    Query,
    /// Request body.
    Body,
    /// Response body.
    Reaction,
}

impl SchemaKey {
    /// All keys, in the order whitelists are reported.
    pub const ALL: [SchemaKey; 3] =
        [SchemaKey::Query, SchemaKey::Body, SchemaKey::Reaction];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKey::Query => "query",
            SchemaKey::Body => "body",
            SchemaKey::Reaction => "reaction",
        }
    }

    /// Whitelist cap used when the key's config leaves `max_properties` unset.
    pub fn default_max_properties(&self) -> usize {
        match self {
            SchemaKey::Query => 30,
            SchemaKey::Body => 80,
            SchemaKey::Reaction => 120,
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-key learning thresholds.
///
/// The upper-case aliases accept option files written for the
/// `MAX_PROPERTIES` / `NUMBER_OF_INSTANCES` / `NUMBER_OF_DAYS` naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaKeyConfig {
    /// Whitelist size cap, also the distinct-property count that freezes
    /// learning. Falls back to the key's default when unset.
    #[serde(default, alias = "MAX_PROPERTIES", skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<usize>,

    /// Freeze once this many samples have been recorded.
    #[serde(default = "default_number_of_instances", alias = "NUMBER_OF_INSTANCES")]
    pub number_of_instances: u64,

    /// Freeze once the accumulator is this many days old.
    #[serde(default = "default_number_of_days", alias = "NUMBER_OF_DAYS")]
    pub number_of_days: u64,
}

impl Default for SchemaKeyConfig {
    fn default() -> Self {
        Self {
            max_properties: None,
            number_of_instances: default_number_of_instances(),
            number_of_days: default_number_of_days(),
        }
    }
}

impl SchemaKeyConfig {
    /// Effective whitelist cap for `key`.
    pub fn max_properties_for(&self, key: SchemaKey) -> usize {
        self.max_properties
            .unwrap_or_else(|| key.default_max_properties())
    }
}

fn default_number_of_instances() -> u64 {
    500
}

fn default_number_of_days() -> u64 {
    7
}
