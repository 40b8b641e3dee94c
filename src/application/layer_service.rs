// Layer service - fetches dataset layers under the view's active filter
use crate::application::feed_repository::{DatasetFeed, FeedError};
use crate::application::hex_aggregator::{LayerKey, RebuildReport};
use crate::application::map_view::{MapViewHandle, ViewError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    View(#[from] ViewError),
}

#[derive(Clone)]
pub struct LayerService {
    feed: Arc<dyn DatasetFeed>,
    view: MapViewHandle,
}

impl LayerService {
    pub fn new(feed: Arc<dyn DatasetFeed>, view: MapViewHandle) -> Self {
        Self { feed, view }
    }

    /// Fetches one layer with the active filter and shows it, replacing any
    /// earlier rendering of the same layer.
    pub async fn show_layer(&self, key: LayerKey) -> Result<RebuildReport, LayerError> {
        let filter = self.view.active_filter().await?;
        self.fetch_and_show(key, filter.as_deref()).await
    }

    /// Stores a new filter (blank clears it) and re-fetches every shown
    /// layer under it. Layers shown later are fetched with it too.
    pub async fn apply_filter(&self, filter: Option<String>) -> Result<Vec<RebuildReport>, LayerError> {
        let filter = filter
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        let shown = self.view.set_filter(filter.clone()).await?;
        tracing::info!("Re-fetching {} layers with filter {:?}", shown.len(), filter);

        let mut reports = Vec::with_capacity(shown.len());
        for key in shown {
            reports.push(self.fetch_and_show(key, filter.as_deref()).await?);
        }
        Ok(reports)
    }

    pub async fn hide_layer(&self, key: LayerKey) -> Result<bool, LayerError> {
        Ok(self.view.hide_layer(key).await?)
    }

    async fn fetch_and_show(&self, key: LayerKey, filter: Option<&str>) -> Result<RebuildReport, LayerError> {
        let features = self.feed.layer_features(&key.dataset, &key.layer, filter).await?;
        tracing::info!("Showing layer {} ({} features)", key, features.len());
        Ok(self.view.show_layer(key, features).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::hex_aggregator::ResolutionLadder;
    use crate::application::locator::FeatureLocator;
    use crate::application::map_view::MapView;
    use crate::domain::catalog::{Dataset, Layer};
    use crate::domain::geometry::FeatureCollection;
    use crate::domain::thing::EntityAssembler;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves two points per layer, one when filtered, and records each fetch.
    #[derive(Default)]
    struct RecordingFeed {
        fetches: Mutex<Vec<(String, String, Option<String>)>>,
    }

    impl RecordingFeed {
        fn fetches(&self) -> Vec<(String, String, Option<String>)> {
            self.fetches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatasetFeed for RecordingFeed {
        async fn list_datasets(&self) -> Result<Vec<Dataset>, FeedError> {
            Ok(Vec::new())
        }

        async fn list_layers(&self, _dataset: &str) -> Result<Vec<Layer>, FeedError> {
            Ok(Vec::new())
        }

        async fn layer_features(
            &self,
            dataset: &str,
            layer: &str,
            filter: Option<&str>,
        ) -> Result<FeatureCollection, FeedError> {
            self.fetches.lock().unwrap().push((
                dataset.to_string(),
                layer.to_string(),
                filter.map(str::to_string),
            ));
            let mut features = vec![json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [100.5, 13.7]},
                "properties": {"noise_level": 80}
            })];
            if filter.is_none() {
                features.push(json!({
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [101.5, 14.7]},
                    "properties": {"noise_level": 40}
                }));
            }
            Ok(FeatureCollection::from_json(&json!({ "features": features })))
        }
    }

    fn service() -> (LayerService, Arc<RecordingFeed>, MapViewHandle) {
        let (view, _task) = MapView::new(
            EntityAssembler::default(),
            FeatureLocator::default(),
            ResolutionLadder::default(),
            10,
        )
        .start();
        let feed = Arc::new(RecordingFeed::default());
        (LayerService::new(feed.clone(), view.clone()), feed, view)
    }

    #[tokio::test]
    async fn test_filter_refetches_every_shown_layer() {
        let (service, feed, view) = service();
        let noise = LayerKey::new("north", "noise");
        let traffic = LayerKey::new("south", "traffic");

        assert_eq!(service.show_layer(noise.clone()).await.unwrap().features, 2);
        assert_eq!(service.show_layer(traffic.clone()).await.unwrap().features, 2);

        let reports = service
            .apply_filter(Some("noise_level > 70".to_string()))
            .await
            .unwrap();
        assert_eq!(
            reports.iter().map(|r| (r.layer.clone(), r.features)).collect::<Vec<_>>(),
            vec![(noise.clone(), 1), (traffic.clone(), 1)]
        );

        let filter = Some("noise_level > 70".to_string());
        let fetches = feed.fetches();
        assert_eq!(fetches[2], ("north".to_string(), "noise".to_string(), filter.clone()));
        assert_eq!(fetches[3], ("south".to_string(), "traffic".to_string(), filter.clone()));

        // Layers shown afterwards use the stored filter
        let parks = LayerKey::new("north", "parks");
        assert_eq!(service.show_layer(parks).await.unwrap().features, 1);
        assert_eq!(feed.fetches()[4].2, filter);
        assert_eq!(view.scene().await.unwrap().layers.len(), 3);
    }

    #[tokio::test]
    async fn test_blank_filter_clears() {
        let (service, feed, view) = service();
        service.apply_filter(Some("noise_level > 70".to_string())).await.unwrap();
        service.show_layer(LayerKey::new("north", "noise")).await.unwrap();

        let reports = service.apply_filter(Some("  ".to_string())).await.unwrap();
        assert_eq!(reports[0].features, 2);
        assert_eq!(feed.fetches()[1].2, None);
        assert_eq!(view.active_filter().await.unwrap(), None);

        assert!(service.hide_layer(LayerKey::new("north", "noise")).await.unwrap());
        assert!(!service.hide_layer(LayerKey::new("south", "noise")).await.unwrap());
    }
}
