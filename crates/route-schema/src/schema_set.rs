use std::collections::BTreeMap;

use route_schema_config::SchemaKey;

use crate::accumulator::{AccumulatorStats, SchemaAccumulator};
use crate::per_key::PerKey;
use crate::whitelist::Whitelist;

/// Learning state of one route.
///
/// Holds all three accumulators or none. A set preloaded from the cache
/// has no accumulators and is crystallised from the start.
pub struct RouteSchemaSet {
    accumulators: Option<PerKey<Box<dyn SchemaAccumulator>>>,
    crystallised: Option<Whitelist>,
}

impl RouteSchemaSet {
    pub(crate) fn learning(accumulators: PerKey<Box<dyn SchemaAccumulator>>) -> Self {
        Self {
            accumulators: Some(accumulators),
            crystallised: None,
        }
    }

    pub(crate) fn preloaded(whitelist: Whitelist) -> Self {
        Self {
            accumulators: None,
            crystallised: Some(whitelist),
        }
    }

    pub fn is_crystallised(&self) -> bool {
        self.crystallised.is_some()
    }

    /// Whether this set came from the cache rather than from traffic.
    pub fn is_preloaded(&self) -> bool {
        self.accumulators.is_none()
    }

    pub fn crystallised(&self) -> Option<&Whitelist> {
        self.crystallised.as_ref()
    }

    pub(crate) fn crystallise(&mut self, whitelist: Whitelist) {
        self.crystallised.get_or_insert(whitelist);
    }

    pub fn accumulator(&self, key: SchemaKey) -> Option<&dyn SchemaAccumulator> {
        self.accumulators.as_ref().map(|a| a.get(key).as_ref())
    }

    pub(crate) fn accumulator_mut(
        &mut self,
        key: SchemaKey,
    ) -> Option<&mut Box<dyn SchemaAccumulator>> {
        self.accumulators.as_mut().map(|a| a.get_mut(key))
    }

    /// Per-key counters; empty for preloaded sets.
    pub fn stats(&self) -> BTreeMap<SchemaKey, AccumulatorStats> {
        match &self.accumulators {
            Some(accumulators) => accumulators
                .iter()
                .map(|(key, acc)| (key, acc.stats()))
                .collect(),
            None => BTreeMap::new(),
        }
    }
}

impl std::fmt::Debug for RouteSchemaSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSchemaSet")
            .field("stats", &self.stats())
            .field("crystallised", &self.crystallised)
            .finish()
    }
}
