use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use route_schema_config::SchemaKey;

/// Identifies one logical endpoint as `"<METHOD> <PATH>"`.
///
/// Case-sensitive: `GET /a` and `get /a` are different routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(method: &str, path: &str) -> Self {
        Self(format!("{method} {path}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RouteId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&RouteDescriptor> for RouteId {
    fn from(route: &RouteDescriptor) -> Self {
        route.route_id()
    }
}

/// Route as described by the request router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Matched path parameters. Not part of the route identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RouteDescriptor {
    pub const DEFAULT_METHOD: &'static str = "get";
    pub const DEFAULT_PATH: &'static str = "/";

    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            path: Some(path.into()),
            params: None,
        }
    }

    pub fn route_id(&self) -> RouteId {
        RouteId::new(
            self.method.as_deref().unwrap_or(Self::DEFAULT_METHOD),
            self.path.as_deref().unwrap_or(Self::DEFAULT_PATH),
        )
    }
}

/// Request side of an observed exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intention {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// One observed request/response pair, already sanitized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedEvent {
    #[serde(default)]
    pub intention: Intention,

    /// Response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Value>,
}

impl ObservedEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.intention.query = Some(query);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.intention.body = Some(body);
        self
    }

    pub fn with_reaction(mut self, reaction: Value) -> Self {
        self.reaction = Some(reaction);
        self
    }

    /// The sample this event carries for `key`, if any.
    pub fn part(&self, key: SchemaKey) -> Option<&Value> {
        match key {
            SchemaKey::Query => self.intention.query.as_ref(),
            SchemaKey::Body => self.intention.body.as_ref(),
            SchemaKey::Reaction => self.reaction.as_ref(),
        }
    }
}
