// Application state for HTTP handlers
use crate::application::feed_repository::{DatasetFeed, SensorFeed};
use crate::application::layer_service::LayerService;
use crate::application::map_view::MapViewHandle;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub view: MapViewHandle,
    pub sensor_feed: Arc<dyn SensorFeed>,
    pub dataset_feed: Arc<dyn DatasetFeed>,
    pub layers: LayerService,
    pub history_limit: usize,
}
