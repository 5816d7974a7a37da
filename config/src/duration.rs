//! Durations are accepted either as a bare number of seconds (`5`, `2.5`),
//! which is what the pool dashboards have always used in their environment,
//! or as a humantime string (`5s`, `1m 30s`).

use eyre::{
    eyre,
    Result,
};
use serde::{
    de,
    Deserialize,
    Deserializer,
    Serializer,
};
use std::time::Duration;

pub fn parse(value: &str) -> Result<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return from_secs(secs);
    }
    humantime::parse_duration(value).map_err(|e| eyre!("Invalid duration '{}': {}", value, e))
}

fn from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| eyre!("Invalid duration '{}s': {}", secs, e))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Secs(f64),
    Text(String),
}

impl Raw {
    fn into_duration(self) -> Result<Duration> {
        match self {
            Raw::Secs(secs) => from_secs(secs),
            Raw::Text(text) => parse(&text),
        }
    }
}

pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    Raw::deserialize(deserializer)?
        .into_duration()
        .map_err(de::Error::custom)
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<Raw>::deserialize(deserializer)?
            .map(Raw::into_duration)
            .transpose()
            .map_err(de::Error::custom)
    }
}
