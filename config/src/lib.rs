#[macro_use]
extern crate tracing;

mod app_config;
mod args;
pub mod duration;

use app_config::AppConfig;
pub use app_config::get_config_dir;
pub use args::Args;
use eyre::{
    eyre,
    Context as _,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    net::SocketAddr,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");
const DEFAULT_METRICS: &str = include_str!("default-metrics.yaml");

/// Display name to locator string.
pub type MetricMapping = BTreeMap<String, String>;
/// Display name to scale factor.
pub type ScaleMapping = BTreeMap<String, f64>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    pub app_config: AppConfig,
    pub json_url: url::Url,
    #[serde(with = "duration")]
    pub poll_interval: Duration,
    #[serde(with = "duration")]
    pub fetch_timeout: Duration,
    pub window_size: usize,
    #[serde(default, with = "duration::option", skip_serializing_if = "Option::is_none")]
    pub retention: Option<Duration>,
    pub listen_address: SocketAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,
    #[serde(default)]
    pub metrics: MetricMapping,
    #[serde(default)]
    pub scales: ScaleMapping,
}

#[derive(Deserialize)]
struct DefaultMetrics {
    metrics: MetricMapping,
    scales: ScaleMapping,
}

fn default_metrics() -> DefaultMetrics {
    serde_yml::from_str(DEFAULT_METRICS).expect("Failed to parse default metrics")
}

impl Default for Config {
    fn default() -> Self {
        let mut config: Self = serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config");
        config.apply_default_metrics();
        config
    }
}

impl Config {
    /// Layers the built-in defaults, the config file and the command line, in
    /// that order of precedence.
    ///
    /// The metric and scale tables are not merged across layers: the first
    /// layer that defines one replaces the built-in table entirely, and
    /// `--metrics-json`/`--scales-json` replace whatever the layers produced.
    pub fn new(args: Args) -> Result<Self> {
        let config_dir = app_config::get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("config_dir", config_dir.to_string_lossy().as_ref())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_file = match &args.config {
            Some(path) => config::File::from(path.as_path()).required(true),
            None => config::File::from(config_dir.join("config.yaml")).required(false),
        };
        builder = builder
            .add_source(config_file.format(config::FileFormat::Yaml))
            .add_source(args.clone());

        let mut cfg: Self = builder
            .build()
            .and_then(|built| built.try_deserialize())
            .wrap_err("Failed to load configuration")?;

        if let Some(json) = &args.metrics_json {
            cfg.metrics = serde_json::from_str(json).wrap_err("METRICS_JSON is not a JSON object of strings")?;
        }
        if let Some(json) = &args.scales_json {
            cfg.scales = serde_json::from_str(json).wrap_err("SCALES_JSON is not a JSON object of numbers")?;
        }
        cfg.apply_default_metrics();

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Args {
            config: Some(path.as_ref().to_path_buf()),
            ..Default::default()
        })
    }

    fn apply_default_metrics(&mut self) {
        if self.metrics.is_empty() || self.scales.is_empty() {
            let defaults = default_metrics();
            if self.metrics.is_empty() {
                self.metrics = defaults.metrics;
            }
            if self.scales.is_empty() {
                self.scales = defaults.scales;
            }
        }
    }

    /// Checks the settings that would otherwise only fail once the poller runs.
    ///
    /// # Errors
    /// Returns an error if the interval, window size or metric table is empty.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(eyre!("poll_interval must be greater than zero"));
        }
        if self.window_size == 0 {
            return Err(eyre!("window_size must be at least 1"));
        }
        if self.metrics.is_empty() {
            return Err(eyre!("at least one metric must be configured"));
        }
        if self.retention.is_some_and(|retention| retention.is_zero()) {
            return Err(eyre!("retention must be greater than zero when set"));
        }
        if self.fetch_timeout >= self.poll_interval {
            warn!(
                fetch_timeout = ?self.fetch_timeout,
                poll_interval = ?self.poll_interval,
                effective = ?self.effective_fetch_timeout(),
                "fetch_timeout is not shorter than poll_interval, clamping"
            );
        }
        Ok(())
    }

    /// The fetch timeout actually used, always shorter than the poll interval
    /// so that a hung upstream cannot swallow the next cycle.
    pub fn effective_fetch_timeout(&self) -> Duration {
        if self.fetch_timeout < self.poll_interval && !self.fetch_timeout.is_zero() {
            self.fetch_timeout
        } else {
            self.poll_interval.mul_f64(0.9)
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.app_config.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_carry_the_pool_metrics() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.window_size, 1000);
        assert_eq!(config.metrics.len(), 10);
        assert_eq!(
            config.metrics.get("Last Share Age (s)").map(String::as_str),
            Some("__computed__.lastshare_age_s")
        );
        assert_eq!(config.scales.get("HR 1m (TH/s)"), Some(&1e-12));
        config.validate().unwrap();
    }

    #[test]
    fn fetch_timeout_is_clamped_below_interval() {
        let config = Config::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.effective_fetch_timeout(), Duration::from_millis(4500));

        let config = Config {
            fetch_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        assert_eq!(config.effective_fetch_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn json_overrides_replace_tables() {
        let config = Config::new(Args {
            config: Some(PathBuf::from("/nonexistent/poolwatch.yaml")),
            ..Default::default()
        });
        assert!(config.is_err(), "an explicit config file must exist");

        let config = Config::new(Args {
            metrics_json: Some(r#"{"Workers": "workers"}"#.to_string()),
            poll_interval: Some("2".to_string()),
            window_size: Some(3),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.metrics.len(), 1);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.window_size, 3);
        // scales fall back to the built-in table, entries for absent names are ignored later
        assert_eq!(config.scales.get("Workers"), Some(&1.0));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let config = Config {
            window_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            poll_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            retention: Some(Duration::ZERO),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_metrics_json_is_an_error() {
        let config = Config::new(Args {
            metrics_json: Some("[1, 2]".to_string()),
            ..Default::default()
        });
        assert!(config.is_err());
    }
}
