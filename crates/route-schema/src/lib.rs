//! Route Schema - per-route schema learning and whitelist crystallisation.
//!
//! Every observed request/response exchange feeds three schema
//! accumulators for its route: query string, request body and response
//! body. Each accumulator learns which property paths occur and how often,
//! until a freeze strategy stops it. Frozen accumulators produce ranked,
//! size-capped whitelists of property paths; once all three keys of a route
//! are frozen the route is *crystallised*, its whitelist becomes immutable
//! and is persisted so later processes skip learning.
//!
//! # Example
//!
//! ```ignore
//! use route_schema::{ObservedEvent, RouteId, RouteSchemaConfig, RouteSchemaRegistry};
//! use serde_json::json;
//!
//! let mut registry = RouteSchemaRegistry::new(RouteSchemaConfig::default());
//! let route = RouteId::new("GET", "/users/:userId");
//!
//! registry.add(&route, &ObservedEvent::new().with_query(json!({"expand": "teams"})));
//!
//! // Only frozen keys are present until the route crystallises.
//! let whitelist = registry.get_whitelist(&route);
//! ```

mod accumulator;
mod flatten;
mod freeze;
mod per_key;
mod registry;
mod route;
mod schema_set;
mod tree;
mod whitelist;

pub use accumulator::{AccumulatorStats, CountingTree, SchemaAccumulator};
pub use flatten::flatten;
pub use freeze::{FreezePredicate, FreezeStrategy, MinAge, MinInstances, MinProperties};
pub use per_key::PerKey;
pub use registry::{
    AccumulatorFactory, Clock, RegistryBuilder, RouteSchemaRegistry, RouteSnapshot,
    SharedRegistry,
};
pub use route::{Intention, ObservedEvent, RouteDescriptor, RouteId};
pub use schema_set::RouteSchemaSet;
pub use tree::{ARRAY_KEY, ARRAY_MARKER, COUNT_KEY, SchemaNode};
pub use whitelist::{RuleFilter, Whitelist, WhitelistFilter, WhitelistGenerator, rank};

pub use route_schema_config::{
    FilterRule, FreezeRule, RouteSchemaConfig, SchemaKey, SchemaKeyConfig,
};
pub use whitelist_cache::{
    CacheMode, FileWhitelistStore, MemWhitelistStore, WhitelistStore,
};
