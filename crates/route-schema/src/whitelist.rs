//! Whitelist generation from frozen schema trees.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use route_schema_config::{FilterRule, SchemaKey};

use crate::flatten::flatten;
use crate::tree::{ARRAY_MARKER, SchemaNode};

/// Ranked property paths approved per schema key.
///
/// A key is absent until its accumulator has frozen. Serializes to the
/// cache-file shape `{"query": [...], "body": [...], "reaction": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whitelist {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Vec<String>>,
}

impl Whitelist {
    pub fn get(&self, key: SchemaKey) -> Option<&[String]> {
        self.slot(key).as_deref()
    }

    pub fn set(&mut self, key: SchemaKey, paths: Vec<String>) {
        *self.slot_mut(key) = Some(paths);
    }

    /// Keys that carry a whitelist.
    pub fn keys(&self) -> impl Iterator<Item = SchemaKey> + '_ {
        SchemaKey::ALL
            .into_iter()
            .filter(|key| self.slot(*key).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.keys().next().is_none()
    }

    /// Whether every schema key is present.
    pub fn is_complete(&self) -> bool {
        self.keys().count() == SchemaKey::ALL.len()
    }

    /// Short stable hash of the whitelist content, for logs and change
    /// detection.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for key in SchemaKey::ALL {
            let Some(paths) = self.get(key) else {
                continue;
            };
            hasher.update(key.as_str().as_bytes());
            hasher.update(b"{");
            for path in paths {
                hasher.update(path.as_bytes());
                hasher.update(b"\n");
            }
            hasher.update(b"}");
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    /// Copy of `value` restricted to the paths whitelisted for `key`.
    ///
    /// Returns `None` when `key` has no whitelist yet. Array elements left
    /// empty by the projection are dropped.
    pub fn project(&self, key: SchemaKey, value: &Value) -> Option<Value> {
        let paths = self.get(key)?;
        let trie = PathTrie::build(paths);
        Some(trie.prune(value).unwrap_or_else(|| empty_like(value)))
    }

    fn slot(&self, key: SchemaKey) -> &Option<Vec<String>> {
        match key {
            SchemaKey::Query => &self.query,
            SchemaKey::Body => &self.body,
            SchemaKey::Reaction => &self.reaction,
        }
    }

    fn slot_mut(&mut self, key: SchemaKey) -> &mut Option<Vec<String>> {
        match key {
            SchemaKey::Query => &mut self.query,
            SchemaKey::Body => &mut self.body,
            SchemaKey::Reaction => &mut self.reaction,
        }
    }
}

fn empty_like(value: &Value) -> Value {
    match value {
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(_) => Value::Object(Map::new()),
        _ => Value::Null,
    }
}

#[derive(Debug, Default)]
struct PathTrie {
    terminal: bool,
    children: BTreeMap<String, PathTrie>,
    element: Option<Box<PathTrie>>,
}

impl PathTrie {
    fn build(paths: &[String]) -> Self {
        let mut root = PathTrie::default();
        for path in paths {
            let mut node = &mut root;
            for segment in path.split('.') {
                let mut name = segment;
                let mut depth = 0;
                while let Some(stripped) = name.strip_suffix(ARRAY_MARKER) {
                    name = stripped;
                    depth += 1;
                }
                if !name.is_empty() {
                    node = node.children.entry(name.to_string()).or_default();
                }
                for _ in 0..depth {
                    node = node.element.get_or_insert_with(Default::default).as_mut();
                }
            }
            node.terminal = true;
        }
        root
    }

    fn prune(&self, value: &Value) -> Option<Value> {
        if self.terminal {
            return Some(value.clone());
        }
        match value {
            Value::Object(map) => {
                let kept: Map<String, Value> = self
                    .children
                    .iter()
                    .filter_map(|(name, child)| {
                        let v = map.get(name)?;
                        Some((name.clone(), child.prune(v)?))
                    })
                    .collect();
                (!kept.is_empty()).then_some(Value::Object(kept))
            }
            Value::Array(items) => {
                let element = self.element.as_ref()?;
                let kept: Vec<Value> =
                    items.iter().filter_map(|item| element.prune(item)).collect();
                (!kept.is_empty()).then_some(Value::Array(kept))
            }
            _ => None,
        }
    }
}

/// Keep/drop decision for a ranked whitelist candidate.
pub trait WhitelistFilter: Send + Sync {
    fn keep(&self, key: SchemaKey, path: &str, count: u64) -> bool;
}

impl<F> WhitelistFilter for F
where
    F: Fn(SchemaKey, &str, u64) -> bool + Send + Sync,
{
    fn keep(&self, key: SchemaKey, path: &str, count: u64) -> bool {
        self(key, path, count)
    }
}

/// Adapter applying a config [`FilterRule`] to every schema key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFilter(pub FilterRule);

impl WhitelistFilter for RuleFilter {
    fn keep(&self, _key: SchemaKey, path: &str, count: u64) -> bool {
        self.0.allows(path, count)
    }
}

/// Order paths by descending count, ties broken by ascending path.
pub fn rank(flat: BTreeMap<String, u64>) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = flat.into_iter().collect();
    ranked.sort_by(|(pa, ca), (pb, cb)| cb.cmp(ca).then_with(|| pa.cmp(pb)));
    ranked
}

/// Turns frozen schema trees into capped, filtered whitelists.
#[derive(Clone, Default)]
pub struct WhitelistGenerator {
    filters: Vec<Arc<dyn WhitelistFilter>>,
}

impl WhitelistGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: &[FilterRule]) -> Self {
        Self {
            filters: rules
                .iter()
                .cloned()
                .map(|rule| Arc::new(RuleFilter(rule)) as Arc<dyn WhitelistFilter>)
                .collect(),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn WhitelistFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Ranked paths of `tree` for `key`, at most `max_properties` of them.
    ///
    /// Candidates are taken in rank order; every filter must keep a
    /// candidate for it to be emitted, and only emitted paths count
    /// towards the cap.
    pub fn generate(
        &self,
        key: SchemaKey,
        tree: &SchemaNode,
        max_properties: usize,
    ) -> Vec<String> {
        let ranked = rank(flatten(tree));
        let mut out = Vec::with_capacity(max_properties.min(ranked.len()));
        for (path, count) in ranked {
            if out.len() >= max_properties {
                break;
            }
            if self.filters.iter().all(|f| f.keep(key, &path, count)) {
                out.push(path);
            }
        }
        out
    }
}

impl fmt::Debug for WhitelistGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhitelistGenerator")
            .field("filters", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree(leaves: &[(&str, u64)]) -> SchemaNode {
        SchemaNode::object(
            1,
            leaves.iter().map(|(k, c)| (k.to_string(), SchemaNode::leaf(*c))),
        )
    }

    #[test]
    fn test_rank_by_count_then_path() {
        let flat: BTreeMap<String, u64> = [("b", 3), ("a", 3), ("c", 9), ("d", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let order: Vec<String> = rank(flat).into_iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_cap_truncates_lowest_ranked() {
        let generator = WhitelistGenerator::new();
        let t = tree(&[("a", 1), ("b", 5), ("c", 3)]);
        assert_eq!(generator.generate(SchemaKey::Body, &t, 2), vec!["b", "c"]);
        assert!(generator.generate(SchemaKey::Body, &t, 0).is_empty());
    }

    #[test]
    fn test_filters_and_together_and_cap_counts_kept() {
        let generator = WhitelistGenerator::from_rules(&[FilterRule::Exclude {
            patterns: vec!["secret".into()],
        }])
        .with_filter(Arc::new(|_key: SchemaKey, _path: &str, count: u64| count > 1));

        let t = tree(&[("secret", 10), ("a", 5), ("b", 4), ("c", 1), ("d", 2)]);
        // secret excluded by pattern, c by count; the cap of 3 is filled by kept paths
        assert_eq!(
            generator.generate(SchemaKey::Reaction, &t, 3),
            vec!["a", "b", "d"]
        );
    }

    #[test]
    fn test_filter_sees_schema_key() {
        let generator = WhitelistGenerator::new().with_filter(Arc::new(
            |key: SchemaKey, _path: &str, _count: u64| key != SchemaKey::Query,
        ));
        let t = tree(&[("a", 1)]);
        assert!(generator.generate(SchemaKey::Query, &t, 10).is_empty());
        assert_eq!(generator.generate(SchemaKey::Body, &t, 10), vec!["a"]);
    }

    #[test]
    fn test_whitelist_serde_shape() {
        let mut wl = Whitelist::default();
        assert!(wl.is_empty());
        wl.set(SchemaKey::Query, vec!["id".into()]);
        wl.set(SchemaKey::Reaction, vec![]);

        assert_eq!(
            serde_json::to_value(&wl).unwrap(),
            json!({"query": ["id"], "reaction": []})
        );
        assert_eq!(wl.keys().collect::<Vec<_>>(), vec![SchemaKey::Query, SchemaKey::Reaction]);
        assert!(!wl.is_complete());

        let back: Whitelist = serde_json::from_value(json!({"body": ["x"]})).unwrap();
        assert_eq!(back.get(SchemaKey::Body), Some(&["x".to_string()][..]));
        assert_eq!(back.get(SchemaKey::Query), None);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut a = Whitelist::default();
        a.set(SchemaKey::Body, vec!["x".into(), "y".into()]);
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);

        b.set(SchemaKey::Body, vec!["y".into(), "x".into()]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_project_keeps_whitelisted_paths() {
        let mut wl = Whitelist::default();
        wl.set(
            SchemaKey::Body,
            vec!["user.id".into(), "items[].sku".into(), "tags".into()],
        );

        let projected = wl
            .project(
                SchemaKey::Body,
                &json!({
                    "user": {"id": 7, "email": "a@b.c"},
                    "items": [{"sku": "x", "price": 1}, {"price": 2}],
                    "tags": ["a", "b"],
                    "token": "secret"
                }),
            )
            .unwrap();

        assert_eq!(
            projected,
            json!({
                "user": {"id": 7},
                "items": [{"sku": "x"}],
                "tags": ["a", "b"]
            })
        );
    }

    #[test]
    fn test_project_missing_key_and_no_matches() {
        let mut wl = Whitelist::default();
        wl.set(SchemaKey::Query, vec!["page".into()]);

        assert!(wl.project(SchemaKey::Body, &json!({"a": 1})).is_none());
        assert_eq!(
            wl.project(SchemaKey::Query, &json!({"other": 1})),
            Some(json!({}))
        );
    }

    #[test]
    fn test_project_root_array() {
        let mut wl = Whitelist::default();
        wl.set(SchemaKey::Reaction, vec!["[].id".into()]);
        assert_eq!(
            wl.project(SchemaKey::Reaction, &json!([{"id": 1, "x": 2}, {"id": 3}])),
            Some(json!([{"id": 1}, {"id": 3}]))
        );
    }
}
