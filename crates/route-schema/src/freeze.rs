//! Freeze strategy: when an accumulator stops learning.
//!
//! A strategy is a set of predicates over an accumulator's counters; the
//! accumulator freezes as soon as any of them holds. The strategy for each
//! schema key is resolved once, when the registry is built: either the
//! built-in thresholds from that key's config or a custom predicate list
//! that replaces them wholesale.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use route_schema_config::{FreezeRule, SchemaKey, SchemaKeyConfig};

use crate::accumulator::AccumulatorStats;

pub trait FreezePredicate: Send + Sync {
    fn should_freeze(&self, stats: &AccumulatorStats, now: DateTime<Utc>) -> bool;
}

impl<F> FreezePredicate for F
where
    F: Fn(&AccumulatorStats, DateTime<Utc>) -> bool + Send + Sync,
{
    fn should_freeze(&self, stats: &AccumulatorStats, now: DateTime<Utc>) -> bool {
        self(stats, now)
    }
}

/// Freeze after this many recorded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinInstances(pub u64);

impl FreezePredicate for MinInstances {
    fn should_freeze(&self, stats: &AccumulatorStats, _now: DateTime<Utc>) -> bool {
        stats.instance_count >= self.0
    }
}

/// Freeze once the accumulator is at least this old.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinAge(pub TimeDelta);

impl MinAge {
    pub fn days(days: u64) -> Self {
        let delta = i64::try_from(days)
            .ok()
            .and_then(TimeDelta::try_days)
            .unwrap_or(TimeDelta::MAX);
        Self(delta)
    }
}

impl FreezePredicate for MinAge {
    fn should_freeze(&self, stats: &AccumulatorStats, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(stats.instantiated_at) >= self.0
    }
}

/// Freeze after this many distinct properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinProperties(pub u64);

impl FreezePredicate for MinProperties {
    fn should_freeze(&self, stats: &AccumulatorStats, _now: DateTime<Utc>) -> bool {
        stats.property_count >= self.0
    }
}

#[derive(Clone)]
pub struct FreezeStrategy {
    predicates: Vec<Arc<dyn FreezePredicate>>,
    custom: bool,
}

impl FreezeStrategy {
    /// Built-in thresholds: sample count, age in days, distinct properties.
    pub fn defaults(key: SchemaKey, cfg: &SchemaKeyConfig) -> Self {
        let max_properties = cfg.max_properties_for(key) as u64;
        Self {
            predicates: vec![
                Arc::new(MinInstances(cfg.number_of_instances)),
                Arc::new(MinAge::days(cfg.number_of_days)),
                Arc::new(MinProperties(max_properties)),
            ],
            custom: false,
        }
    }

    /// A caller-supplied predicate set. No defaults are kept.
    pub fn custom<I>(predicates: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn FreezePredicate>>,
    {
        Self {
            predicates: predicates.into_iter().collect(),
            custom: true,
        }
    }

    /// Custom strategy built from config rules.
    pub fn from_rules(rules: &[FreezeRule]) -> Self {
        Self::custom(rules.iter().map(|rule| -> Arc<dyn FreezePredicate> {
            match *rule {
                FreezeRule::InstanceCount { at_least } => Arc::new(MinInstances(at_least)),
                FreezeRule::AgeDays { at_least } => Arc::new(MinAge::days(at_least)),
                FreezeRule::PropertyCount { at_least } => {
                    Arc::new(MinProperties(at_least))
                }
            }
        }))
    }

    pub fn should_freeze(&self, stats: &AccumulatorStats, now: DateTime<Utc>) -> bool {
        self.predicates.iter().any(|p| p.should_freeze(stats, now))
    }

    pub fn is_custom(&self) -> bool {
        self.custom
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Debug for FreezeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreezeStrategy")
            .field("predicates", &self.predicates.len())
            .field("custom", &self.custom)
            .finish()
    }
}
