use std::io::Cursor;

use pretty_assertions::assert_eq;
use serde_json::json;

use route_schema::{FreezeRule, RouteSchemaConfig, RouteSchemaRegistry};
use runner::{ReplayStats, replay, whitelists};

fn registry(freeze_after: u64) -> RouteSchemaRegistry {
    let mut config = RouteSchemaConfig::uncached();
    config.freeze_strategy = Some(vec![FreezeRule::InstanceCount {
        at_least: freeze_after,
    }]);
    RouteSchemaRegistry::new(config)
}

#[test]
fn replays_ndjson_into_whitelists() {
    let input = [
        json!({
            "route": {"method": "GET", "path": "/users/:userId"},
            "event": {
                "intention": {
                    "query": {"abc": 123, "word": true},
                    "body": {"def": 456, "ghi": 789, "jkl": {"mno": 131415}}
                },
                "reaction": {"pqr": 161718}
            }
        }),
        json!({
            "route": {"method": "GET", "path": "/users/:userId"},
            "event": {"intention": {"query": {"abc": 123}, "body": {}}, "reaction": {}}
        }),
        json!({
            "route": {"path": "/health"},
            "event": {"reaction": {"status": "up"}}
        }),
    ]
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join("\n");

    let mut registry = registry(2);
    let stats = replay(&mut registry, Cursor::new(input)).unwrap();
    assert_eq!(
        stats,
        ReplayStats {
            lines: 3,
            replayed: 3,
            skipped: 0
        }
    );

    let report = serde_json::to_value(whitelists(&mut registry)).unwrap();
    assert_eq!(
        report,
        json!({
            "GET /users/:userId": {
                "query": ["abc", "word"],
                "body": ["def", "ghi", "jkl.mno"],
                "reaction": ["pqr"]
            },
            "get /health": {}
        })
    );
}

#[test]
fn malformed_and_blank_lines_are_skipped() {
    let input = "\n{not json}\n{\"route\":{\"method\":\"POST\",\"path\":\"/a\"},\"event\":{}}\n   \n";

    let mut registry = registry(1);
    let stats = replay(&mut registry, Cursor::new(input)).unwrap();

    assert_eq!(stats.lines, 4);
    assert_eq!(stats.replayed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn record_without_event_still_registers_route() {
    let mut registry = registry(1);
    replay(&mut registry, Cursor::new("{\"route\":{\"method\":\"PUT\",\"path\":\"/b\"}}")).unwrap();

    let snapshot = registry.snapshots();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].route.as_str(), "PUT /b");
    assert!(snapshot[0].keys.values().all(|s| s.instance_count == 0));
}

#[test]
fn replay_persists_crystallised_routes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RouteSchemaConfig::default();
    config.cache_path = dir.path().join("cache.json");
    config.freeze_strategy = Some(vec![FreezeRule::InstanceCount { at_least: 1 }]);

    let line = json!({
        "route": {"method": "GET", "path": "/c"},
        "event": {"intention": {"query": {"q": 1}, "body": {}}, "reaction": {"r": 1}}
    })
    .to_string();

    let mut registry = RouteSchemaRegistry::new(config.clone());
    replay(&mut registry, Cursor::new(line)).unwrap();
    whitelists(&mut registry);
    registry.flush_blocking();

    let stored: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&config.cache_path).unwrap()).unwrap();
    assert_eq!(
        stored,
        json!({"GET /c": {"query": ["q"], "body": [], "reaction": ["r"]}})
    );
}
