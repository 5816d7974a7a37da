//! # Field resolution
//!
//! Turns a raw status document into one scaled value per configured metric.
//!
//! Resolution is pure: the only inputs are the document, the time it was
//! fetched at and the metric table. A metric that cannot be resolved becomes
//! [`MetricValue::Unresolved`] without affecting any other metric.

use crate::metrics::{
    ComputedKey,
    JsonPath,
    Locator,
    MetricSpec,
    MetricTable,
    MetricValue,
    PathSegment,
    UnresolvedReason,
};
use chrono::{
    DateTime,
    Utc,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Resolves every metric of `table` against `raw`.
pub fn resolve(raw: &Value, fetched_at: DateTime<Utc>, table: &MetricTable) -> BTreeMap<String, MetricValue> {
    table
        .iter()
        .map(|spec| (spec.name.clone(), resolve_metric(raw, fetched_at, spec)))
        .collect()
}

pub fn resolve_metric(raw: &Value, fetched_at: DateTime<Utc>, spec: &MetricSpec) -> MetricValue {
    let value = match &spec.locator {
        Locator::Direct(path) => lookup(raw, path).and_then(coerce),
        Locator::Computed(key) => compute(raw, fetched_at, key),
    };
    match value {
        Ok(value) => MetricValue::Resolved(value * spec.scale),
        Err(reason) => MetricValue::Unresolved(reason),
    }
}

fn compute(raw: &Value, fetched_at: DateTime<Utc>, key: &ComputedKey) -> Result<f64, UnresolvedReason> {
    match key {
        ComputedKey::Age { timestamp } => {
            let timestamp = lookup(raw, timestamp).and_then(coerce)?;
            let now = fetched_at.timestamp_millis() as f64 / 1000.0;
            let age = now - timestamp;
            if age < 0.0 {
                return Err(UnresolvedReason::FutureTimestamp);
            }
            Ok(age)
        }
    }
}

fn lookup<'a>(raw: &'a Value, path: &JsonPath) -> Result<&'a Value, UnresolvedReason> {
    path.segments().iter().try_fold(raw, |current, segment| match (segment, current) {
        (PathSegment::Key(key), Value::Object(map)) => map.get(key).ok_or(UnresolvedReason::MissingKey),
        (PathSegment::Index(index), Value::Array(items)) => {
            items.get(*index).ok_or(UnresolvedReason::IndexOutOfRange)
        }
        _ => Err(UnresolvedReason::WrongShape),
    })
}

/// Pool APIs report some figures as strings with an SI suffix, e.g. `"10.7T"`.
fn coerce(value: &Value) -> Result<f64, UnresolvedReason> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_unit_number(text),
        _ => None,
    };
    number.filter(|n| n.is_finite()).ok_or(UnresolvedReason::NotNumeric)
}

fn parse_unit_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let multiplier = match text.chars().last()?.to_ascii_uppercase() {
        'K' => 1e3,
        'M' => 1e6,
        'G' => 1e9,
        'T' => 1e12,
        'P' => 1e15,
        _ => return text.parse().ok(),
    };
    let digits = text[..text.len() - 1].trim_end();
    if !is_plain_decimal(digits) {
        return None;
    }
    digits.parse::<f64>().ok().map(|n| n * multiplier)
}

/// Unsigned digits with at most one decimal point, e.g. `10.7` or `.5`.
fn is_plain_decimal(text: &str) -> bool {
    let mut parts = text.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    match fraction {
        Some(fraction) => all_digits(whole) && !fraction.is_empty() && all_digits(fraction),
        None => !whole.is_empty() && all_digits(whole),
    }
}
