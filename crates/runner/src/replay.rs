//! NDJSON traffic replay.
//!
//! Each input line is one recorded exchange:
//! `{"route": {"method": "GET", "path": "/users/:id"}, "event": {...}}`.

use std::collections::BTreeMap;
use std::io::BufRead;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use route_schema::{ObservedEvent, RouteDescriptor, RouteId, RouteSchemaRegistry, Whitelist};

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRecord {
    #[serde(default)]
    pub route: RouteDescriptor,
    #[serde(default)]
    pub event: ObservedEvent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub lines: u64,
    pub replayed: u64,
    pub skipped: u64,
}

/// Feed every record of `input` into `registry`.
///
/// Blank lines are ignored. Lines that do not parse are logged and
/// skipped; only read errors abort the replay.
pub fn replay<R: BufRead>(registry: &mut RouteSchemaRegistry, input: R) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read input line {line_no}"))?;
        stats.lines += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ReplayRecord>(&line) {
            Ok(record) => {
                let route = record.route.route_id();
                debug!(line = line_no, route = %route, "replaying");
                registry.add(&route, &record.event);
                stats.replayed += 1;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed record");
                stats.skipped += 1;
            }
        }
    }

    info!(
        lines = stats.lines,
        replayed = stats.replayed,
        skipped = stats.skipped,
        routes = registry.len(),
        "replay finished"
    );
    Ok(stats)
}

/// Current whitelist of every known route, keyed by route id.
///
/// Routes whose keys are all frozen crystallise here.
pub fn whitelists(registry: &mut RouteSchemaRegistry) -> BTreeMap<RouteId, Whitelist> {
    let routes: Vec<RouteId> = registry.routes().cloned().collect();
    routes
        .into_iter()
        .map(|route| {
            let whitelist = registry.get_whitelist(&route);
            (route, whitelist)
        })
        .collect()
}
