use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::tree::SchemaNode;

/// Counters an accumulator exposes to freeze decisions and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccumulatorStats {
    /// Samples recorded so far.
    pub instance_count: u64,

    /// Distinct property paths discovered so far.
    pub property_count: u64,

    /// When the accumulator was created.
    pub instantiated_at: DateTime<Utc>,

    /// Whether learning has stopped.
    pub frozen: bool,
}

/// Learns the shape of a stream of JSON samples.
///
/// Once frozen an accumulator never unfreezes, and `record` leaves its
/// counts untouched.
pub trait SchemaAccumulator: Send {
    fn record(&mut self, sample: &Value);

    fn is_frozen(&self) -> bool;

    fn freeze(&mut self);

    fn export_tree(&self) -> SchemaNode;

    fn stats(&self) -> AccumulatorStats;
}

#[derive(Debug, Clone, Default)]
struct CountingNode {
    count: u64,
    children: BTreeMap<String, CountingNode>,
    elements: Option<Box<CountingNode>>,
}

impl CountingNode {
    /// Merge the shape of `value` into this node. Returns the number of
    /// named nodes created.
    fn absorb(&mut self, value: &Value) -> u64 {
        match value {
            Value::Object(map) => {
                let mut created = 0;
                for (key, child_value) in map {
                    if !self.children.contains_key(key) {
                        created += 1;
                    }
                    let child = self.children.entry(key.clone()).or_default();
                    child.count += 1;
                    created += child.absorb(child_value);
                }
                created
            }
            Value::Array(items) => {
                let mut created = 0;
                // an array of scalars still exports as an array, not a leaf
                let element = self.elements.get_or_insert_with(Default::default);
                for item in items.iter().filter(|i| i.is_object() || i.is_array()) {
                    element.count += 1;
                    created += element.absorb(item);
                }
                created
            }
            _ => 0,
        }
    }

    fn export(&self) -> SchemaNode {
        if !self.children.is_empty() {
            return SchemaNode::Object {
                count: self.count,
                children: self
                    .children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.export()))
                    .collect(),
                element: self.elements.as_ref().map(|e| Box::new(e.export())),
            };
        }
        match &self.elements {
            Some(element) => SchemaNode::array(self.count, element.export()),
            None => SchemaNode::leaf(self.count),
        }
    }
}

/// Counting-tree accumulator.
///
/// Every property path gets a counter of the samples (or array elements)
/// it appeared in. Arrays of objects merge all their elements into one
/// element shape; scalar array elements are not tracked, so an array that
/// only ever held scalars contributes no paths. A property seen both as an
/// object and as an array keeps both shapes.
#[derive(Debug, Clone)]
pub struct CountingTree {
    root: CountingNode,
    instance_count: u64,
    property_count: u64,
    instantiated_at: DateTime<Utc>,
    frozen: bool,
}

impl CountingTree {
    pub fn new() -> Self {
        Self::with_instantiated_at(Utc::now())
    }

    /// Tree whose age is measured from `at`.
    pub fn with_instantiated_at(at: DateTime<Utc>) -> Self {
        Self {
            root: CountingNode::default(),
            instance_count: 0,
            property_count: 0,
            instantiated_at: at,
            frozen: false,
        }
    }
}

impl Default for CountingTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaAccumulator for CountingTree {
    fn record(&mut self, sample: &Value) {
        if self.frozen {
            trace!("sample ignored by frozen accumulator");
            return;
        }
        self.instance_count += 1;
        self.root.count += 1;
        self.property_count += self.root.absorb(sample);
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn export_tree(&self) -> SchemaNode {
        self.root.export()
    }

    fn stats(&self) -> AccumulatorStats {
        AccumulatorStats {
            instance_count: self.instance_count,
            property_count: self.property_count,
            instantiated_at: self.instantiated_at,
            frozen: self.frozen,
        }
    }
}
