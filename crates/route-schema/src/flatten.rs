//! Flattening of schema trees into dotted property paths.

use std::collections::BTreeMap;

use crate::tree::{ARRAY_MARKER, SchemaNode};

/// Flatten `tree` into `path -> count`.
///
/// Paths join object keys with `.` and mark array elements with `[]`, e.g.
/// `items[].sku`. The root itself is never recorded. Array elements that are
/// plain scalars contribute no paths.
pub fn flatten(tree: &SchemaNode) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    match tree {
        SchemaNode::Object {
            children, element, ..
        } => {
            walk_children(children, "", &mut out);
            if let Some(element) = element {
                descend(element, ARRAY_MARKER.to_string(), &mut out);
            }
        }
        SchemaNode::Array { element, .. } => {
            descend(element, ARRAY_MARKER.to_string(), &mut out)
        }
        SchemaNode::Leaf { .. } => {}
    }
    out
}

fn walk_children(
    children: &BTreeMap<String, SchemaNode>,
    prefix: &str,
    out: &mut BTreeMap<String, u64>,
) {
    for (key, child) in children {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match child {
            SchemaNode::Array { element, .. } => {
                descend(element, format!("{path}{ARRAY_MARKER}"), out)
            }
            SchemaNode::Object {
                count,
                children,
                element,
            } => {
                if child.is_leaf() {
                    out.insert(path, *count);
                    continue;
                }
                walk_children(children, &path, out);
                // same property also seen as an array
                if let Some(element) = element {
                    descend(element, format!("{path}{ARRAY_MARKER}"), out);
                }
            }
            SchemaNode::Leaf { count } => {
                out.insert(path, *count);
            }
        }
    }
}

/// Walk one array level. `path` already ends with the array marker.
fn descend(element: &SchemaNode, path: String, out: &mut BTreeMap<String, u64>) {
    match element {
        SchemaNode::Object {
            children, element, ..
        } => {
            walk_children(children, &path, out);
            if let Some(element) = element {
                descend(element, format!("{path}{ARRAY_MARKER}"), out);
            }
        }
        SchemaNode::Array { element, .. } => {
            descend(element, format!("{path}{ARRAY_MARKER}"), out)
        }
        SchemaNode::Leaf { .. } => {}
    }
}
