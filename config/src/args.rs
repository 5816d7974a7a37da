use clap::Parser;
use std::{
    net::SocketAddr,
    path::PathBuf,
};

/// Polls a mining-pool worker status API and serves the metric history over HTTP.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Optional config file, read instead of `config.yaml` in the config directory.
    #[clap(long, env = "POOLWATCH_CONFIG_FILE", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// URL of the JSON status document to poll.
    #[clap(long, env = "JSON_URL", value_name = "URL")]
    pub json_url: Option<String>,

    /// Time between two polls, in seconds or as a duration such as `5s`.
    #[clap(long, env = "POLL_INTERVAL", value_name = "DURATION")]
    pub poll_interval: Option<String>,

    /// Upper bound for a single fetch. Clamped below the poll interval.
    #[clap(long, env = "FETCH_TIMEOUT", value_name = "DURATION")]
    pub fetch_timeout: Option<String>,

    /// Number of samples kept in memory.
    #[clap(long, env = "WINDOW_SIZE", value_name = "COUNT")]
    pub window_size: Option<usize>,

    /// Drop samples older than this, even if the window is not full.
    #[clap(long, env = "RETENTION", value_name = "DURATION")]
    pub retention: Option<String>,

    /// Address the HTTP server listens on.
    #[clap(long, env = "LISTEN_ADDRESS", value_name = "ADDR")]
    pub listen_address: Option<SocketAddr>,

    /// Directory with a front-end to serve at `/`.
    #[clap(long, env = "PUBLIC_DIR", value_name = "DIR")]
    pub public_dir: Option<PathBuf>,

    /// JSON object of display name to locator, replacing the configured metrics.
    #[clap(long, env = "METRICS_JSON", value_name = "JSON")]
    pub metrics_json: Option<String>,

    /// JSON object of display name to scale factor, replacing the configured scales.
    #[clap(long, env = "SCALES_JSON", value_name = "JSON")]
    pub scales_json: Option<String>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(url) = &self.json_url {
                cache.insert("json_url".to_string(), url.clone().into());
            }
            if let Some(interval) = &self.poll_interval {
                cache.insert("poll_interval".to_string(), interval.clone().into());
            }
            if let Some(timeout) = &self.fetch_timeout {
                cache.insert("fetch_timeout".to_string(), timeout.clone().into());
            }
            if let Some(window_size) = self.window_size {
                cache.insert("window_size".to_string(), (window_size as u64).into());
            }
            if let Some(retention) = &self.retention {
                cache.insert("retention".to_string(), retention.clone().into());
            }
            if let Some(address) = &self.listen_address {
                cache.insert("listen_address".to_string(), address.to_string().into());
            }
            if let Some(dir) = &self.public_dir {
                cache.insert("public_dir".to_string(), dir.display().to_string().into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let author = clap::crate_authors!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "{}

Authors: {author}

Config directory: {config_dir_path}",
        clap::crate_version!()
    )
}
