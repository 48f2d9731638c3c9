use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A named performance counter as produced by the aggregation buffer.
///
/// Names are dot-delimited (e.g., `"orders.create.exec_time"`). The case is
/// preserved as stored; rendering decides how it is exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    /// Dot-delimited counter name.
    pub name: String,

    /// Unix epoch milliseconds of the last update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,

    /// Typed payload.
    #[serde(flatten)]
    pub value: CounterValue,
}

/// Aggregated interval/statistics payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub count: Option<i64>,
}

impl Statistics {
    /// Create a fully populated statistics payload.
    pub fn new(min: f64, max: f64, average: f64, count: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            average: Some(average),
            count: Some(count),
        }
    }
}

/// Counter payload, one variant per statistical shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CounterValue {
    /// Number of occurrences.
    Increment {
        #[serde(default)]
        count: Option<i64>,
    },

    /// Time interval measurements (min/max/average/count).
    Interval(Statistics),

    /// Most recent observed value.
    LastValue {
        #[serde(default)]
        last: Option<f64>,
    },

    /// Value distribution statistics (min/max/average/count).
    Statistics(Statistics),

    /// Point in time; carries no numeric payload.
    Timestamp,
}

/// Counter kind without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterType {
    Increment,
    Interval,
    LastValue,
    Statistics,
    Timestamp,
}

impl CounterType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterType::Increment => "increment",
            CounterType::Interval => "interval",
            CounterType::LastValue => "last_value",
            CounterType::Statistics => "statistics",
            CounterType::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for CounterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl CounterValue {
    /// An unset payload of the given kind.
    pub fn empty(counter_type: CounterType) -> Self {
        match counter_type {
            CounterType::Increment => CounterValue::Increment { count: None },
            CounterType::Interval => CounterValue::Interval(Statistics::default()),
            CounterType::LastValue => CounterValue::LastValue { last: None },
            CounterType::Statistics => CounterValue::Statistics(Statistics::default()),
            CounterType::Timestamp => CounterValue::Timestamp,
        }
    }

    /// The kind of this payload.
    pub fn counter_type(&self) -> CounterType {
        match self {
            CounterValue::Increment { .. } => CounterType::Increment,
            CounterValue::Interval(_) => CounterType::Interval,
            CounterValue::LastValue { .. } => CounterType::LastValue,
            CounterValue::Statistics(_) => CounterType::Statistics,
            CounterValue::Timestamp => CounterType::Timestamp,
        }
    }
}

impl Counter {
    /// Create a counter with the given payload and the current time.
    pub fn new(name: impl Into<String>, value: CounterValue) -> Self {
        Self {
            name: name.into(),
            time: Some(current_timestamp_millis()),
            value,
        }
    }

    /// Create a counter of the given kind with every field unset.
    pub fn empty(name: impl Into<String>, counter_type: CounterType) -> Self {
        Self {
            name: name.into(),
            time: None,
            value: CounterValue::empty(counter_type),
        }
    }

    pub fn increment(name: impl Into<String>, count: i64) -> Self {
        Self::new(name, CounterValue::Increment { count: Some(count) })
    }

    pub fn last_value(name: impl Into<String>, last: f64) -> Self {
        Self::new(name, CounterValue::LastValue { last: Some(last) })
    }

    pub fn interval(name: impl Into<String>, stats: Statistics) -> Self {
        Self::new(name, CounterValue::Interval(stats))
    }

    pub fn statistics(name: impl Into<String>, stats: Statistics) -> Self {
        Self::new(name, CounterValue::Statistics(stats))
    }

    pub fn timestamp(name: impl Into<String>, time: i64) -> Self {
        Self {
            name: name.into(),
            time: Some(time),
            value: CounterValue::Timestamp,
        }
    }

    /// Override the update time.
    pub fn with_time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    /// The kind of this counter.
    pub fn counter_type(&self) -> CounterType {
        self.value.counter_type()
    }

    /// Clear every measured field back to unset, keeping name and kind.
    pub fn reset(&mut self) {
        self.time = None;
        self.value = CounterValue::empty(self.counter_type());
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
