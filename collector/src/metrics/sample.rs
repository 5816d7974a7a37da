use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Serialize,
    Serializer,
};
use std::{
    collections::BTreeMap,
    sync::Arc,
};
use strum::Display;

/// Why a single metric has no value in an otherwise successful sample.
#[derive(Debug, Clone, Copy, Display, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnresolvedReason {
    MissingKey,
    IndexOutOfRange,
    WrongShape,
    NotNumeric,
    FutureTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Resolved(f64),
    Unresolved(UnresolvedReason),
}

impl MetricValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Resolved(value) => Some(*value),
            MetricValue::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, MetricValue::Resolved(_))
    }
}

/// Serialized as the plain number, or `null` when unresolved.
impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

/// One successfully fetched status document together with the metrics
/// resolved from it. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub fetched_at: DateTime<Utc>,
    #[serde(skip)]
    pub raw: Arc<serde_json::Value>,
    pub values: BTreeMap<String, MetricValue>,
}

impl Sample {
    pub fn new(fetched_at: DateTime<Utc>, raw: serde_json::Value, values: BTreeMap<String, MetricValue>) -> Self {
        Self {
            fetched_at,
            raw: Arc::new(raw),
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.values.get(name)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = (&str, UnresolvedReason)> {
        self.values.iter().filter_map(|(name, value)| match value {
            MetricValue::Unresolved(reason) => Some((name.as_str(), *reason)),
            MetricValue::Resolved(_) => None,
        })
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.fetched_at.timestamp_millis()
    }
}
