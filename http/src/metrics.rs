use crate::{
    error::AppError,
    router::AppState,
};
use axum::{
    extract::{
        Path,
        State,
    },
    Json,
};
use poolwatch_collector::{
    LatestView,
    Sample,
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::Arc,
};

pub async fn latest(State(state): State<AppState>) -> Json<LatestView> {
    Json(state.handle.latest())
}

pub async fn raw(State(state): State<AppState>) -> Result<Json<Arc<serde_json::Value>>, AppError> {
    let sample = state.handle.latest().sample.ok_or(AppError::NoSample)?;
    Ok(Json(sample.raw.clone()))
}

#[derive(Serialize)]
pub struct WindowResponse {
    capacity: usize,
    samples: Vec<Arc<Sample>>,
}

pub async fn window(State(state): State<AppState>) -> Json<WindowResponse> {
    Json(WindowResponse {
        capacity: state.handle.capacity(),
        samples: state.handle.all(),
    })
}

#[derive(Serialize)]
pub struct SeriesResponse {
    series: BTreeMap<String, Vec<(i64, f64)>>,
}

/// Every metric as `[[timestamp_ms, value], ...]`, the shape the dashboard charts consume.
pub async fn data(State(state): State<AppState>) -> Json<SeriesResponse> {
    let mut series = state.handle.series();
    for name in state.config.metrics.keys() {
        series.entry(name.clone()).or_default();
    }
    Json(SeriesResponse { series })
}

#[derive(Serialize)]
pub struct MetricResponse {
    name: String,
    points: Vec<(i64, f64)>,
}

pub async fn metric(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MetricResponse>, AppError> {
    if !state.config.metrics.contains_key(&name) {
        return Err(AppError::UnknownMetric(name));
    }
    let points = state
        .handle
        .all()
        .iter()
        .filter_map(|sample| {
            let value = sample.get(&name)?.value()?;
            Some((sample.timestamp_ms(), value))
        })
        .collect();
    Ok(Json(MetricResponse { name, points }))
}
