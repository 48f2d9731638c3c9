//! Prometheus text exposition of resolved counters.
//!
//! Every sample is exposed as a gauge with its own `# TYPE` header:
//!
//! ```text
//! # TYPE exec_time_max gauge
//! exec_time_max{source="app",service="orders",command="create"} 3
//! ```

use std::fmt::Write;

use countergate_common::{Counter, CounterValue, Statistics};

use crate::mapping::ResolvedMetric;

/// Suffixes emitted for interval and statistics counters, in render order.
pub const STATISTICS_SUFFIXES: [&str; 4] = ["_max", "_min", "_average", "_count"];

/// A single sample value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Integer(i64),
    Float(f64),
}

impl std::fmt::Display for SampleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleValue::Integer(v) => write!(f, "{}", v),
            SampleValue::Float(v) => f.write_str(&format_value(*v)),
        }
    }
}

/// Expand a counter into `(metric name, value)` samples.
///
/// Unset fields render as zero. Timestamp counters produce no samples.
pub fn samples(family: &str, counter: &Counter) -> Vec<(String, SampleValue)> {
    match &counter.value {
        CounterValue::Increment { count } => {
            vec![(family.to_string(), SampleValue::Integer(count.unwrap_or(0)))]
        }
        CounterValue::LastValue { last } => {
            vec![(family.to_string(), SampleValue::Float(last.unwrap_or(0.0)))]
        }
        CounterValue::Interval(stats) | CounterValue::Statistics(stats) => {
            statistics_samples(family, stats)
        }
        // TODO: decide whether timestamps should be exposed as a seconds gauge;
        // scrapers currently never see them.
        CounterValue::Timestamp => Vec::new(),
    }
}

fn statistics_samples(family: &str, stats: &Statistics) -> Vec<(String, SampleValue)> {
    let values = [
        SampleValue::Float(stats.max.unwrap_or(0.0)),
        SampleValue::Float(stats.min.unwrap_or(0.0)),
        SampleValue::Float(stats.average.unwrap_or(0.0)),
        SampleValue::Integer(stats.count.unwrap_or(0)),
    ];

    STATISTICS_SUFFIXES
        .iter()
        .zip(values)
        .map(|(suffix, value)| (format!("{}{}", family, suffix), value))
        .collect()
}

/// Render one counter into exposition blocks, one per sample.
///
/// Each block is a `# TYPE` header followed by the sample line. Global
/// labels come first, then the resolver's labels, both in their given order.
pub fn render(
    resolved: &ResolvedMetric,
    counter: &Counter,
    global_labels: &[(String, String)],
) -> Vec<String> {
    let label_block = format_labels(global_labels.iter().chain(&resolved.labels));

    samples(&resolved.family, counter)
        .into_iter()
        .map(|(name, value)| {
            let mut block = String::with_capacity(2 * name.len() + label_block.len() + 32);
            writeln!(block, "# TYPE {} gauge", name).ok();
            if label_block.is_empty() {
                writeln!(block, "{} {}", name, value).ok();
            } else {
                writeln!(block, "{}{} {}", name, label_block, value).ok();
            }
            block
        })
        .collect()
}

/// Format labels for Prometheus exposition format.
///
/// Values are written as given inside double quotes. Returns an empty
/// string when there are no labels.
pub fn format_labels<'a>(labels: impl IntoIterator<Item = &'a (String, String)>) -> String {
    let parts: Vec<String> = labels
        .into_iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect();

    if parts.is_empty() {
        return String::new();
    }

    format!("{{{}}}", parts.join(","))
}

/// Format a floating point value for Prometheus.
///
/// Integral values have no decimal point; others use the shortest
/// representation that round-trips.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
