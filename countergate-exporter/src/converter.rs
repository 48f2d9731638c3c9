//! Conversion of counter snapshots into a Prometheus text body.

use countergate_common::Counter;

use crate::mapping::resolve;
use crate::render::render;

/// Build the global label pairs: `source`, then `instance`, each only if non-empty.
pub fn global_labels(source: Option<&str>, instance: Option<&str>) -> Vec<(String, String)> {
    [("source", source), ("instance", instance)]
        .into_iter()
        .filter_map(|(key, value)| match value {
            Some(v) if !v.is_empty() => Some((key.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}

/// Render counters as Prometheus text exposition.
///
/// Counters are rendered in the given order with no sorting or
/// deduplication. An empty or absent slice yields an empty string.
pub fn to_text(counters: Option<&[Counter]>, source: Option<&str>, instance: Option<&str>) -> String {
    let counters = match counters {
        Some(c) if !c.is_empty() => c,
        _ => return String::new(),
    };

    let labels = global_labels(source, instance);
    let mut body = String::with_capacity(counters.len() * 100);

    for counter in counters {
        let resolved = resolve(&counter.name);
        for block in render(&resolved, counter, &labels) {
            body.push_str(&block);
        }
    }

    body
}
