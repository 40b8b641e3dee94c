// Route table
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    click_marker, current_feature, current_thing, get_scene, health_check, hide_layer, list_datasets,
    list_layers, locate_feature, set_filter, set_mode, set_zoom, show_layer, thing_history,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Compression is handled in the response builders, not by a layer
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/scene", get(get_scene))
        .route("/things/current", get(current_thing))
        .route("/things/:id/history", get(thing_history))
        .route("/markers/:handle/click", post(click_marker))
        .route("/features/current", get(current_feature))
        .route("/datasets", get(list_datasets))
        .route("/datasets/:id/layers", get(list_layers))
        .route(
            "/datasets/:id/layers/:layer",
            post(show_layer).delete(hide_layer),
        )
        .route(
            "/datasets/:id/layers/:layer/features/:index/locate",
            get(locate_feature),
        )
        .route("/view/zoom", post(set_zoom))
        .route("/view/filter", post(set_filter))
        .route("/view/mode", post(set_mode))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
