use crate::metrics;
use axum::{
    extract::State,
    routing::get,
    Json,
    Router,
};
use poolwatch_collector::{
    MetricTable,
    MetricsHandle,
};
use poolwatch_config::Config;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    path::Path,
    sync::Arc,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};

/// The effective configuration, as served on `/config`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub json_url: String,
    pub poll_interval_sec: f64,
    pub fetch_timeout_sec: f64,
    pub window_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_sec: Option<f64>,
    pub metrics: BTreeMap<String, String>,
    pub scales: BTreeMap<String, f64>,
}

impl ConfigView {
    pub fn new(config: &Config, table: &MetricTable) -> Self {
        Self {
            json_url: config.json_url.to_string(),
            poll_interval_sec: config.poll_interval.as_secs_f64(),
            fetch_timeout_sec: config.effective_fetch_timeout().as_secs_f64(),
            window_size: config.window_size,
            retention_sec: config.retention.map(|retention| retention.as_secs_f64()),
            metrics: table
                .iter()
                .map(|spec| (spec.name.clone(), spec.locator.to_string()))
                .collect(),
            scales: table.iter().map(|spec| (spec.name.clone(), spec.scale)).collect(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigView>,
    pub handle: MetricsHandle,
}

pub fn create_router(config: ConfigView, handle: MetricsHandle, public_dir: Option<&Path>) -> Router {
    let state = AppState {
        config: Arc::new(config),
        handle,
    };

    let api = Router::new()
        .route("/latest", get(metrics::latest))
        .route("/raw", get(metrics::raw))
        .route("/window", get(metrics::window))
        .route("/metrics/{name}", get(metrics::metric));

    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/data", get(metrics::data))
        .route("/config", get(config_handler))
        .nest("/api", api);

    if let Some(dir) = public_dir {
        router = router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn config_handler(State(state): State<AppState>) -> Json<Arc<ConfigView>> {
    Json(state.config.clone())
}
