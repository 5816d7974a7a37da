use eyre::{
    Context as _,
    Result,
};
use poolwatch_collector::{
    HttpFetcher,
    MetricTable,
    Poller,
    WindowStore,
};
use poolwatch_config::{
    Args,
    Config,
};
use poolwatch_http::{
    create_router,
    ConfigView,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct App {
    config: Config,
    table: Arc<MetricTable>,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(args)?;
        config.validate()?;
        let table = MetricTable::from_config(&config).wrap_err("Invalid metric configuration")?;

        Ok(Self {
            config,
            table: Arc::new(table),
        })
    }

    /// Polls and serves until Ctrl-C, then stops the poller and drains the server.
    pub async fn run(self) -> Result<()> {
        let Self { config, table } = self;

        let mut window = WindowStore::new(config.window_size);
        if let Some(retention) = config.retention {
            window = window.with_retention(retention);
        }

        let fetcher = HttpFetcher::from_config(&config).wrap_err("Failed to build HTTP client")?;
        info!(url = %fetcher.url(), metrics = table.len(), "Collecting pool status");

        let poller = Poller::new(
            fetcher,
            table.clone(),
            Arc::new(window),
            config.poll_interval,
            config.effective_fetch_timeout(),
        );
        let router = create_router(
            ConfigView::new(&config, &table),
            poller.handle(),
            config.public_dir.as_deref(),
        );

        let cancel = CancellationToken::new();
        let poller_task = poller.spawn(cancel.clone());

        let shutdown = {
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
                    _ = cancel.cancelled() => {}
                }
                cancel.cancel();
            }
        };

        let served = poolwatch_http::serve(config.listen_address, router, shutdown)
            .await
            .wrap_err_with(|| format!("HTTP server on {} failed", config.listen_address));

        cancel.cancel();
        poller_task.await.wrap_err("Poller task panicked")?;
        served
    }
}
