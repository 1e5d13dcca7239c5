//! Route registry: one schema set per route, whitelist crystallisation and
//! cache persistence.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use route_schema_config::{RouteSchemaConfig, SchemaKey};
use whitelist_cache::{CacheMode, WhitelistCache, WhitelistStore};

use crate::accumulator::{AccumulatorStats, CountingTree, SchemaAccumulator};
use crate::freeze::{FreezePredicate, FreezeStrategy};
use crate::per_key::PerKey;
use crate::route::{ObservedEvent, RouteId};
use crate::schema_set::RouteSchemaSet;
use crate::whitelist::{Whitelist, WhitelistFilter, WhitelistGenerator};

/// Builds the accumulator for a schema key, created at the given instant.
pub type AccumulatorFactory =
    Arc<dyn Fn(SchemaKey, DateTime<Utc>) -> Box<dyn SchemaAccumulator> + Send + Sync>;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Registry shared between request handlers.
pub type SharedRegistry = Arc<Mutex<RouteSchemaRegistry>>;

/// Operator view of one route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSnapshot {
    pub route: RouteId,
    pub crystallised: bool,
    pub preloaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub keys: BTreeMap<SchemaKey, AccumulatorStats>,
}

/// Learns per-route schemas and hands out whitelists.
///
/// Every operation takes `&mut self` and runs to completion without
/// yielding; wrap the registry in a [`SharedRegistry`] to use it from
/// several tasks.
pub struct RouteSchemaRegistry {
    routes: HashMap<RouteId, RouteSchemaSet>,
    freeze: PerKey<FreezeStrategy>,
    caps: PerKey<usize>,
    generator: WhitelistGenerator,
    factory: AccumulatorFactory,
    cache: Option<WhitelistCache<Whitelist>>,
    clock: Clock,
}

impl RouteSchemaRegistry {
    pub fn new(config: RouteSchemaConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: RouteSchemaConfig) -> RegistryBuilder {
        RegistryBuilder::new(config)
    }

    /// Feed one observed exchange into the route's accumulators.
    ///
    /// Missing parts are skipped. Frozen accumulators are left untouched.
    pub fn add(&mut self, route: &RouteId, event: &ObservedEvent) {
        let now = (self.clock)();
        let set = route_entry(&mut self.routes, &self.factory, route, now);
        counter!("route_schema_events_total").increment(1);

        for key in SchemaKey::ALL {
            let Some(sample) = event.part(key) else {
                continue;
            };
            let Some(acc) = set.accumulator_mut(key) else {
                continue;
            };
            let strategy = self.freeze.get(key);
            if refresh_freeze(route, key, acc.as_mut(), strategy, now) {
                continue;
            }
            acc.record(sample);
            refresh_freeze(route, key, acc.as_mut(), strategy, now);
        }
    }

    /// Current whitelist of `route`.
    ///
    /// Only frozen keys are present. The first call that finds all three
    /// keys frozen crystallises the route: the result is kept, returned
    /// unchanged from then on and queued for persistence once.
    pub fn get_whitelist(&mut self, route: &RouteId) -> Whitelist {
        let now = (self.clock)();
        let set = route_entry(&mut self.routes, &self.factory, route, now);
        if let Some(whitelist) = set.crystallised() {
            return whitelist.clone();
        }

        let mut whitelist = Whitelist::default();
        for key in SchemaKey::ALL {
            let Some(acc) = set.accumulator_mut(key) else {
                continue;
            };
            if !refresh_freeze(route, key, acc.as_mut(), self.freeze.get(key), now) {
                continue;
            }
            let paths = self
                .generator
                .generate(key, &acc.export_tree(), *self.caps.get(key));
            whitelist.set(key, paths);
        }

        if whitelist.is_complete() {
            set.crystallise(whitelist.clone());
            counter!("route_schema_crystallised_total").increment(1);
            info!(
                route = %route,
                fingerprint = %whitelist.fingerprint(),
                query = whitelist.query.as_ref().map_or(0, Vec::len),
                body = whitelist.body.as_ref().map_or(0, Vec::len),
                reaction = whitelist.reaction.as_ref().map_or(0, Vec::len),
                "route crystallised"
            );
            if let Some(cache) = &self.cache {
                cache.persist(route.as_str(), &whitelist);
            }
        }
        whitelist
    }

    /// Routes seen so far, including preloaded ones.
    pub fn routes(&self) -> impl Iterator<Item = &RouteId> {
        self.routes.keys()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route_set(&self, route: &RouteId) -> Option<&RouteSchemaSet> {
        self.routes.get(route)
    }

    pub fn is_crystallised(&self, route: &RouteId) -> bool {
        self.routes
            .get(route)
            .is_some_and(RouteSchemaSet::is_crystallised)
    }

    pub fn snapshot(&self, route: &RouteId) -> Option<RouteSnapshot> {
        self.routes.get(route).map(|set| RouteSnapshot {
            route: route.clone(),
            crystallised: set.is_crystallised(),
            preloaded: set.is_preloaded(),
            fingerprint: set.crystallised().map(Whitelist::fingerprint),
            keys: set.stats(),
        })
    }

    /// Snapshots of every route, ordered by route id.
    pub fn snapshots(&self) -> Vec<RouteSnapshot> {
        let mut ids: Vec<&RouteId> = self.routes.keys().collect();
        ids.sort();
        ids.into_iter().filter_map(|id| self.snapshot(id)).collect()
    }

    /// `None` when caching is turned off in the config.
    pub fn cache_mode(&self) -> Option<CacheMode> {
        self.cache.as_ref().map(WhitelistCache::mode)
    }

    /// Wait for queued cache writes.
    pub async fn flush(&self) {
        if let Some(cache) = &self.cache {
            cache.flush().await;
        }
    }

    /// Blocking variant of [`flush`](Self::flush), for non-async callers.
    pub fn flush_blocking(&self) {
        if let Some(cache) = &self.cache {
            cache.flush_blocking();
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }
}

impl fmt::Debug for RouteSchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSchemaRegistry")
            .field("routes", &self.routes.len())
            .field("freeze", &self.freeze)
            .field("caps", &self.caps)
            .field("generator", &self.generator)
            .field("cache", &self.cache_mode())
            .finish()
    }
}

fn route_entry<'a>(
    routes: &'a mut HashMap<RouteId, RouteSchemaSet>,
    factory: &AccumulatorFactory,
    route: &RouteId,
    now: DateTime<Utc>,
) -> &'a mut RouteSchemaSet {
    routes.entry(route.clone()).or_insert_with(|| {
        debug!(route = %route, "new route");
        RouteSchemaSet::learning(PerKey::from_fn(|key| factory(key, now)))
    })
}

fn counting_tree(_key: SchemaKey, at: DateTime<Utc>) -> Box<dyn SchemaAccumulator> {
    Box::new(CountingTree::with_instantiated_at(at))
}

/// Freeze `acc` if its strategy says so. Returns whether it is frozen.
fn refresh_freeze(
    route: &RouteId,
    key: SchemaKey,
    acc: &mut dyn SchemaAccumulator,
    strategy: &FreezeStrategy,
    now: DateTime<Utc>,
) -> bool {
    if acc.is_frozen() {
        return true;
    }
    let stats = acc.stats();
    if !strategy.should_freeze(&stats, now) {
        return false;
    }
    acc.freeze();
    counter!("route_schema_frozen_total", "key" => key.as_str()).increment(1);
    info!(
        route = %route,
        key = %key,
        instances = stats.instance_count,
        properties = stats.property_count,
        "schema frozen"
    );
    true
}

/// Configures a [`RouteSchemaRegistry`].
///
/// Freeze strategy precedence: [`freeze_strategy`](Self::freeze_strategy),
/// then the config's `freeze_strategy` rules, then per-key defaults.
pub struct RegistryBuilder {
    config: RouteSchemaConfig,
    freeze: Option<FreezeStrategy>,
    filters: Vec<Arc<dyn WhitelistFilter>>,
    factory: Option<AccumulatorFactory>,
    clock: Option<Clock>,
    store: Option<Arc<dyn WhitelistStore>>,
}

impl RegistryBuilder {
    fn new(config: RouteSchemaConfig) -> Self {
        Self {
            config,
            freeze: None,
            filters: Vec::new(),
            factory: None,
            clock: None,
            store: None,
        }
    }

    /// Replace the freeze predicates of every key.
    pub fn freeze_strategy<I>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn FreezePredicate>>,
    {
        self.freeze = Some(FreezeStrategy::custom(predicates));
        self
    }

    /// Add a whitelist filter after the config's filter rules.
    pub fn filter(mut self, filter: Arc<dyn WhitelistFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn accumulator_factory(mut self, factory: AccumulatorFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Cache backend to use instead of the config's `cache_path` file.
    /// Ignored when caching is disabled.
    pub fn cache_store(mut self, store: Arc<dyn WhitelistStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> RouteSchemaRegistry {
        let config = self.config;

        let freeze = match (self.freeze, &config.freeze_strategy) {
            (Some(custom), _) => PerKey::from_fn(|_| custom.clone()),
            (None, Some(rules)) => {
                let strategy = FreezeStrategy::from_rules(rules);
                PerKey::from_fn(|_| strategy.clone())
            }
            (None, None) => {
                PerKey::from_fn(|key| FreezeStrategy::defaults(key, config.key(key)))
            }
        };
        let caps = PerKey::from_fn(|key| config.max_properties(key));

        let generator = self
            .filters
            .into_iter()
            .fold(
                WhitelistGenerator::from_rules(&config.filter_whitelist_strategy),
                WhitelistGenerator::with_filter,
            );

        let factory: AccumulatorFactory = match self.factory {
            Some(factory) => factory,
            None => Arc::new(counting_tree),
        };
        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(Utc::now),
        };

        let mut routes = HashMap::new();
        let cache = if config.cache {
            let mut cache = match self.store {
                Some(store) => WhitelistCache::open(store),
                None => WhitelistCache::file(&config.cache_path),
            };
            for (route, whitelist) in cache.take_preloaded() {
                routes.insert(RouteId::from(route), RouteSchemaSet::preloaded(whitelist));
            }
            info!(preloaded = routes.len(), mode = ?cache.mode(), "whitelist cache opened");
            Some(cache)
        } else {
            debug!("whitelist cache disabled");
            None
        };

        info!(
            custom_freeze = freeze.query.is_custom(),
            query_cap = caps.query,
            body_cap = caps.body,
            reaction_cap = caps.reaction,
            "route schema registry ready"
        );

        RouteSchemaRegistry {
            routes,
            freeze,
            caps,
            generator,
            factory,
            cache,
            clock,
        }
    }
}
