use poolwatch_config::{
    MetricMapping,
    ScaleMapping,
};
use serde::{
    Serialize,
    Serializer,
};
use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
};

/// Locators starting with this marker name a computed field instead of a path.
pub const COMPUTED_MARKER: &str = "__computed__.";

/// Problems with the metric and scale tables. These are fatal at startup.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SpecError {
    #[error("no metrics configured")]
    Empty,
    #[error("metric name must not be empty")]
    EmptyName,
    #[error("metric '{name}': invalid path '{path}': {reason}")]
    InvalidPath { name: String, path: String, reason: String },
    #[error("metric '{name}': unknown computed field '{key}'")]
    UnknownComputedKey { name: String, key: String },
    #[error("metric '{name}': scale {scale} must be finite and non-zero")]
    InvalidScale { name: String, scale: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Navigation path into a JSON document, written as `worker[0].hashrate1m`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath(Vec<PathSegment>);

impl JsonPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self(vec![PathSegment::Key(key.into())])
    }
}

impl FromStr for JsonPath {
    type Err = String;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        if path.is_empty() {
            return Err("path is empty".to_string());
        }

        let mut segments = Vec::new();
        for part in path.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(open) => part.split_at(open),
                None => (part, ""),
            };
            if key.is_empty() {
                return Err(format!("segment '{part}' has no key"));
            }
            if key.contains(']') {
                return Err(format!("unbalanced ']' in '{part}'"));
            }
            segments.push(PathSegment::Key(key.to_string()));

            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| format!("unclosed '[' in '{part}'"))?;
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| format!("'{}' is not an array index", &rest[1..close]))?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(format!("unexpected '{rest}' after index in '{part}'"));
                }
            }
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Derived quantities that are not present verbatim in the status document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputedKey {
    /// Seconds between the epoch-seconds timestamp at `timestamp` and the
    /// time the sample was fetched.
    Age { timestamp: JsonPath },
}

impl ComputedKey {
    fn parse(name: &str, key: &str) -> Result<Self, SpecError> {
        let invalid_path = |path: &str, reason: String| SpecError::InvalidPath {
            name: name.to_string(),
            path: path.to_string(),
            reason,
        };
        match key {
            "lastshare_age_s" => Ok(ComputedKey::Age {
                timestamp: JsonPath::key("lastshare"),
            }),
            _ => match key.strip_prefix("age:") {
                Some(path) => Ok(ComputedKey::Age {
                    timestamp: path.parse().map_err(|reason| invalid_path(path, reason))?,
                }),
                None => Err(SpecError::UnknownComputedKey {
                    name: name.to_string(),
                    key: key.to_string(),
                }),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Direct(JsonPath),
    Computed(ComputedKey),
}

impl Locator {
    pub fn parse(name: &str, locator: &str) -> Result<Self, SpecError> {
        let locator = locator.trim();
        match locator.strip_prefix(COMPUTED_MARKER) {
            Some(key) => ComputedKey::parse(name, key).map(Locator::Computed),
            None => locator
                .parse()
                .map(Locator::Direct)
                .map_err(|reason| SpecError::InvalidPath {
                    name: name.to_string(),
                    path: locator.to_string(),
                    reason,
                }),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Direct(path) => write!(f, "{path}"),
            Locator::Computed(ComputedKey::Age { timestamp }) => write!(f, "{COMPUTED_MARKER}age:{timestamp}"),
        }
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSpec {
    pub name: String,
    pub locator: Locator,
    pub scale: f64,
}

/// Immutable table of every metric the poller resolves, keyed by display name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTable {
    specs: BTreeMap<String, MetricSpec>,
}

impl MetricTable {
    /// Builds the table from the configured name → locator and name → scale
    /// mappings. Scales for names that are not metrics are skipped.
    pub fn from_mappings(metrics: &MetricMapping, scales: &ScaleMapping) -> Result<Self, SpecError> {
        if metrics.is_empty() {
            return Err(SpecError::Empty);
        }

        for name in scales.keys().filter(|name| !metrics.contains_key(*name)) {
            warn!(metric = %name, "ignoring scale for unknown metric");
        }

        let specs = metrics
            .iter()
            .map(|(name, locator)| {
                if name.trim().is_empty() {
                    return Err(SpecError::EmptyName);
                }
                let scale = scales.get(name).copied().unwrap_or(1.0);
                if !scale.is_finite() || scale == 0.0 {
                    return Err(SpecError::InvalidScale {
                        name: name.clone(),
                        scale,
                    });
                }
                let spec = MetricSpec {
                    name: name.clone(),
                    locator: Locator::parse(name, locator)?,
                    scale,
                };
                Ok((name.clone(), spec))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self { specs })
    }

    pub fn from_config(config: &poolwatch_config::Config) -> Result<Self, SpecError> {
        Self::from_mappings(&config.metrics, &config.scales)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSpec> {
        self.specs.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&MetricSpec> {
        self.specs.get(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapping<V: Clone>(entries: &[(&str, V)]) -> BTreeMap<String, V> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn parses_nested_paths() {
        let path: JsonPath = "worker[0].hashrate1m".parse().unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("worker".into()),
                PathSegment::Index(0),
                PathSegment::Key("hashrate1m".into()),
            ]
        );
        assert_eq!(path.to_string(), "worker[0].hashrate1m");

        let path: JsonPath = "grid[1][2].value".parse().unwrap();
        assert_eq!(path.segments().len(), 4);
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "a..b", ".a", "a[", "a[x]", "a]", "a[0]b", "[0]"] {
            assert!(bad.parse::<JsonPath>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn computed_locators() {
        assert_eq!(
            Locator::parse("age", "__computed__.lastshare_age_s").unwrap(),
            Locator::Computed(ComputedKey::Age {
                timestamp: JsonPath::key("lastshare"),
            })
        );
        assert_eq!(
            Locator::parse("age", "__computed__.age:worker[0].lastshare").unwrap(),
            Locator::Computed(ComputedKey::Age {
                timestamp: "worker[0].lastshare".parse().unwrap(),
            })
        );
        assert_eq!(
            Locator::parse("x", "__computed__.uptime"),
            Err(SpecError::UnknownComputedKey {
                name: "x".into(),
                key: "uptime".into(),
            })
        );
    }

    #[test]
    fn table_defaults_scale_and_ignores_orphans() {
        let table = MetricTable::from_mappings(
            &mapping(&[("Workers", "workers".to_string()), ("HR", "hashrate1m".to_string())]),
            &mapping(&[("HR", 1e-12), ("Nope", 5.0)]),
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Workers").unwrap().scale, 1.0);
        assert_eq!(table.get("HR").unwrap().scale, 1e-12);
        assert!(table.get("Nope").is_none());
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["HR", "Workers"]);
    }

    #[test]
    fn table_rejects_inconsistent_input() {
        assert_eq!(
            MetricTable::from_mappings(&BTreeMap::new(), &BTreeMap::new()),
            Err(SpecError::Empty)
        );
        assert!(matches!(
            MetricTable::from_mappings(&mapping(&[("A", "a".to_string())]), &mapping(&[("A", 0.0)])),
            Err(SpecError::InvalidScale { .. })
        ));
        assert!(matches!(
            MetricTable::from_mappings(&mapping(&[("A", "a".to_string())]), &mapping(&[("A", f64::NAN)])),
            Err(SpecError::InvalidScale { .. })
        ));
        assert!(matches!(
            MetricTable::from_mappings(&mapping(&[("A", "a[".to_string())]), &BTreeMap::new()),
            Err(SpecError::InvalidPath { .. })
        ));
    }

    #[test]
    fn default_config_builds() {
        let table = MetricTable::from_config(&poolwatch_config::Config::default()).unwrap();
        assert_eq!(table.len(), 10);
    }
}
