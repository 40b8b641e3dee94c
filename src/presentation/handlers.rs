// HTTP request handlers
use crate::application::feed_repository::FeedError;
use crate::application::hex_aggregator::LayerKey;
use crate::application::layer_service::LayerError;
use crate::application::locator::Viewport;
use crate::application::map_view::{ViewError, ViewMode};
use crate::application::render_surface::LayerHandle;
use crate::domain::history::{summarize_all, SignalSummary};
use crate::domain::observation::ThingId;
use crate::domain::thing::Thing;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct FilterQuery {
    pub filter: Option<String>,
}

#[derive(Deserialize)]
pub struct ZoomQuery {
    pub level: u8,
}

#[derive(Deserialize)]
pub struct ModeQuery {
    pub mode: ViewMode,
}

#[derive(Deserialize)]
pub struct ViewportQuery {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ViewportQuery {
    fn viewport(&self) -> Viewport {
        let default = Viewport::default();
        Viewport {
            width: self.width.unwrap_or(default.width),
            height: self.height.unwrap_or(default.height),
        }
    }
}

#[derive(Serialize)]
pub struct ThingHistory {
    pub thing: Thing,
    pub summaries: Vec<SignalSummary>,
}

async fn respond<T: Serialize>(value: &T, headers: &HeaderMap) -> Response {
    match json_response(value, accepts_brotli(headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

fn not_found(what: String) -> Response {
    (StatusCode::NOT_FOUND, axum::Json(json!({ "error": what }))).into_response()
}

fn view_unavailable(e: ViewError) -> Response {
    tracing::error!("Map view unavailable: {}", e);
    (StatusCode::SERVICE_UNAVAILABLE, axum::Json(json!({ "error": e.to_string() }))).into_response()
}

fn layer_failure(e: LayerError) -> Response {
    match e {
        LayerError::Feed(e) => feed_failure(e),
        LayerError::View(e) => view_unavailable(e),
    }
}

fn feed_failure(e: FeedError) -> Response {
    tracing::warn!("Feed request failed: {}", e);
    let status = match e {
        FeedError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, axum::Json(json!({ "error": e.to_string() }))).into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Render-ready scene plus view state
pub async fn get_scene(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    match state.view.scene().await {
        Ok(scene) => respond(&scene, &headers).await,
        Err(e) => view_unavailable(e),
    }
}

pub async fn current_thing(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    match state.view.current_thing().await {
        Ok(thing) => respond(&thing, &headers).await,
        Err(e) => view_unavailable(e),
    }
}

pub async fn click_marker(
    Path(handle): Path<u64>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.view.click(LayerHandle(handle)).await {
        Ok(Some(thing)) => respond(&thing, &headers).await,
        Ok(None) => not_found(format!("no marker {}", LayerHandle(handle))),
        Err(e) => view_unavailable(e),
    }
}

/// Per-signal history summary for the detail panel
pub async fn thing_history(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let id = ThingId(id);
    let thing = match state.view.thing(id.clone()).await {
        Ok(Some(thing)) => thing,
        Ok(None) => return not_found(format!("no thing {}", id)),
        Err(e) => return view_unavailable(e),
    };

    let history = match state.sensor_feed.history(&id, state.history_limit).await {
        Ok(history) => history,
        Err(e) => return feed_failure(e),
    };

    // Only signals the Thing currently reports
    let summaries = summarize_all(&history)
        .into_iter()
        .filter(|summary| {
            thing
                .signals
                .iter()
                .any(|s| s.name.as_deref() == Some(summary.signal.as_str()))
        })
        .collect();

    respond(&ThingHistory { thing, summaries }, &headers).await
}

pub async fn current_feature(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    match state.view.current_feature().await {
        Ok(feature) => respond(&feature, &headers).await,
        Err(e) => view_unavailable(e),
    }
}

pub async fn list_datasets(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    match state.dataset_feed.list_datasets().await {
        Ok(datasets) => respond(&datasets, &headers).await,
        Err(e) => feed_failure(e),
    }
}

pub async fn list_layers(
    Path(dataset): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.dataset_feed.list_layers(&dataset).await {
        Ok(layers) => respond(&layers, &headers).await,
        Err(e) => feed_failure(e),
    }
}

/// Shows a layer, fetched with the active filter
pub async fn show_layer(
    Path((dataset, layer)): Path<(String, String)>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.layers.show_layer(LayerKey::new(dataset, layer)).await {
        Ok(report) => respond(&report, &headers).await,
        Err(e) => layer_failure(e),
    }
}

pub async fn hide_layer(
    Path((dataset, layer)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let key = LayerKey::new(dataset, layer);
    match state.layers.hide_layer(key.clone()).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(format!("layer {} is not shown", key)),
        Err(e) => layer_failure(e),
    }
}

/// Sets the filter for every layer fetch; shown layers are re-fetched.
/// A missing or blank filter clears it.
pub async fn set_filter(
    Query(query): Query<FilterQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.layers.apply_filter(query.filter).await {
        Ok(reports) => respond(&reports, &headers).await,
        Err(e) => layer_failure(e),
    }
}

pub async fn set_zoom(
    Query(query): Query<ZoomQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.view.set_zoom(query.level).await {
        Ok(reports) => respond(&reports, &headers).await,
        Err(e) => view_unavailable(e),
    }
}

pub async fn set_mode(
    Query(query): Query<ModeQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.view.set_mode(query.mode).await {
        Ok(cleared) => respond(&json!({ "mode": query.mode, "cleared": cleared }), &headers).await,
        Err(e) => view_unavailable(e),
    }
}

/// View fit for one feature of a shown layer
pub async fn locate_feature(
    Path((dataset, layer, index)): Path<(String, String, usize)>,
    Query(query): Query<ViewportQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let layer = LayerKey::new(dataset, layer);
    match state.view.locate(layer.clone(), index, query.viewport()).await {
        Ok(Some(located)) => respond(&located, &headers).await,
        Ok(None) => not_found(format!("feature {} of layer {} cannot be located", index, layer)),
        Err(e) => view_unavailable(e),
    }
}
