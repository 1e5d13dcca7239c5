//! Schema trees exported by accumulators.
//!
//! A tree records how often each property was observed. Objects map
//! property names to child nodes, arrays aggregate the shape of all their
//! object elements into a single element node, and leaves carry only a
//! counter.

use std::collections::BTreeMap;

use serde_json::Value;

/// Path suffix marking "one element of an array" in flattened paths.
pub const ARRAY_MARKER: &str = "[]";

/// Counter key used by accumulators that export untyped JSON trees.
pub const COUNT_KEY: &str = "_propertyCount";

/// Array-element key used by accumulators that export untyped JSON trees.
pub const ARRAY_KEY: &str = "_arrayObjects";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    Leaf {
        count: u64,
    },
    /// Named children. `element` is set when the same property was also
    /// seen as an array, and holds that array's element shape.
    Object {
        count: u64,
        children: BTreeMap<String, SchemaNode>,
        element: Option<Box<SchemaNode>>,
    },
    Array {
        count: u64,
        element: Box<SchemaNode>,
    },
}

impl SchemaNode {
    pub fn leaf(count: u64) -> Self {
        SchemaNode::Leaf { count }
    }

    pub fn object<I, K>(count: u64, children: I) -> Self
    where
        I: IntoIterator<Item = (K, SchemaNode)>,
        K: Into<String>,
    {
        SchemaNode::Object {
            count,
            children: children.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            element: None,
        }
    }

    /// Attach an array-element shape to an object node. Other variants are
    /// returned unchanged.
    pub fn with_element(self, shape: SchemaNode) -> Self {
        match self {
            SchemaNode::Object {
                count, children, ..
            } => SchemaNode::Object {
                count,
                children,
                element: Some(Box::new(shape)),
            },
            other => other,
        }
    }

    pub fn array(count: u64, element: SchemaNode) -> Self {
        SchemaNode::Array {
            count,
            element: Box::new(element),
        }
    }

    /// How many times this node was observed.
    pub fn count(&self) -> u64 {
        match self {
            SchemaNode::Leaf { count }
            | SchemaNode::Object { count, .. }
            | SchemaNode::Array { count, .. } => *count,
        }
    }

    /// Whether flattening records this node as a property instead of
    /// descending into it.
    pub fn is_leaf(&self) -> bool {
        match self {
            SchemaNode::Leaf { .. } => true,
            SchemaNode::Object {
                children, element, ..
            } => children.is_empty() && element.is_none(),
            SchemaNode::Array { .. } => false,
        }
    }

    /// Convert an untyped tree that marks counters with `_propertyCount`
    /// and array elements with `_arrayObjects`.
    ///
    /// A node with named children is an object; an array marker next to
    /// them is kept as the object's element shape. Non-object input becomes
    /// an empty leaf.
    pub fn from_counted_json(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return SchemaNode::leaf(0);
        };

        let count = map.get(COUNT_KEY).and_then(Value::as_u64).unwrap_or(0);
        let children: BTreeMap<String, SchemaNode> = map
            .iter()
            .filter(|(k, _)| k.as_str() != COUNT_KEY && k.as_str() != ARRAY_KEY)
            .map(|(k, v)| (k.clone(), SchemaNode::from_counted_json(v)))
            .collect();

        let element = map
            .get(ARRAY_KEY)
            .map(|e| Box::new(SchemaNode::from_counted_json(e)));

        match (children.is_empty(), element) {
            (false, element) => SchemaNode::Object {
                count,
                children,
                element,
            },
            (true, Some(element)) => SchemaNode::Array { count, element },
            (true, None) => SchemaNode::leaf(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counted_json_nested_objects() {
        let tree = SchemaNode::from_counted_json(&json!({
            "a": {"_propertyCount": 2, "b": {"_propertyCount": 1}}
        }));

        assert_eq!(
            tree,
            SchemaNode::object(
                0,
                [("a", SchemaNode::object(2, [("b", SchemaNode::leaf(1))]))]
            )
        );
    }

    #[test]
    fn test_counted_json_array_marker() {
        let tree = SchemaNode::from_counted_json(&json!({
            "arr": {"_arrayObjects": {"name": {"_propertyCount": 5}}, "_propertyCount": 2}
        }));

        let SchemaNode::Object { children, .. } = tree else {
            panic!("root should be an object");
        };
        assert_eq!(
            children["arr"],
            SchemaNode::array(2, SchemaNode::object(0, [("name", SchemaNode::leaf(5))]))
        );
    }

    #[test]
    fn test_counted_json_keeps_both_shapes() {
        let tree = SchemaNode::from_counted_json(&json!({
            "items": {
                "_propertyCount": 10,
                "note": {"_propertyCount": 1},
                "_arrayObjects": {"sku": {"_propertyCount": 9}}
            }
        }));

        let SchemaNode::Object { children, .. } = tree else {
            panic!("root should be an object");
        };
        assert_eq!(
            children["items"],
            SchemaNode::object(10, [("note", SchemaNode::leaf(1))])
                .with_element(SchemaNode::object(0, [("sku", SchemaNode::leaf(9))]))
        );
        assert!(!children["items"].is_leaf());
    }

    #[test]
    fn test_counter_only_node_is_leaf() {
        let node = SchemaNode::from_counted_json(&json!({"_propertyCount": 4}));
        assert_eq!(node, SchemaNode::leaf(4));
        assert!(node.is_leaf());
        assert!(SchemaNode::object(1, Vec::<(String, SchemaNode)>::new()).is_leaf());
        assert!(!SchemaNode::array(1, SchemaNode::leaf(1)).is_leaf());
    }
}
