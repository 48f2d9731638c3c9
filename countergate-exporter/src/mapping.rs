//! Mapping from dotted counter names to Prometheus metric families and labels.
//!
//! Three naming conventions are recognized; anything else falls back to a
//! generic family name without labels:
//!
//! | Counter name                              | Family              | Labels                     |
//! |-------------------------------------------|---------------------|----------------------------|
//! | `<service>.<command>.exec_time`           | `exec_time`         | service, command           |
//! | `<target>.<service>.<command>.call_count` | `call_count`        | service, command, target   |
//! | `queue.<name>.sent_messages`              | `queue_sent_messages` | queue                    |
//! | `My.Other.Name`                           | `my_other_name`     | (none)                     |

/// Metric suffixes of service-level execution counters.
pub const EXEC_METRICS: [&str; 3] = ["exec_time", "exec_count", "exec_errors"];

/// Metric suffixes of client-level call counters.
pub const CALL_METRICS: [&str; 3] = ["call_time", "call_count", "call_errors"];

/// Metric suffixes of message queue counters.
pub const QUEUE_METRICS: [&str; 3] = ["sent_messages", "received_messages", "dead_messages"];

/// A counter name resolved into a metric family and ordered labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMetric {
    /// Lowercase metric family name.
    pub family: String,
    /// Label pairs in render order. Keys may repeat.
    pub labels: Vec<(String, String)>,
}

impl ResolvedMetric {
    fn new(family: impl Into<String>, labels: Vec<(&str, &str)>) -> Self {
        Self {
            family: family.into().to_lowercase(),
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Resolve a dotted counter name.
///
/// Matching is on the exact segment count and the exact (case-sensitive)
/// final segment. Label values keep their original case.
pub fn resolve(name: &str) -> ResolvedMetric {
    let parts: Vec<&str> = name.split('.').collect();

    match parts.as_slice() {
        [service, command, metric] if EXEC_METRICS.contains(metric) => {
            ResolvedMetric::new(*metric, vec![("service", *service), ("command", *command)])
        }
        [target, service, command, metric] if CALL_METRICS.contains(metric) => ResolvedMetric::new(
            *metric,
            vec![("service", *service), ("command", *command), ("target", *target)],
        ),
        ["queue", queue, metric] if QUEUE_METRICS.contains(metric) => {
            ResolvedMetric::new(format!("queue_{}", metric), vec![("queue", *queue)])
        }
        _ => ResolvedMetric::new(fallback_family(name), Vec::new()),
    }
}

/// Generic family name: lowercased with every `.` replaced by `_`.
pub fn fallback_family(name: &str) -> String {
    name.to_lowercase().replace('.', "_")
}
