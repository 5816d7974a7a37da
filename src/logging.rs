use eyre::{
    Context as _,
    Result,
};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

/// Log level used when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVES: &str = "info";

pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVES))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(filter))
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .context("Failed to initialize tracing subscriber")
}
