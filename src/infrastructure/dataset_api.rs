// HTTP dataset/layer feed implementation
use crate::application::feed_repository::{DatasetFeed, FeedError};
use crate::domain::catalog::{Dataset, Layer};
use crate::domain::geometry::FeatureCollection;
use crate::infrastructure::feed_client::FeedClient;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct HttpDatasetFeed {
    client: FeedClient,
    base_url: String,
}

impl HttpDatasetFeed {
    pub fn new(client: FeedClient, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_layer_url(&self, dataset: &str, layer: &str, filter: Option<&str>) -> String {
        let mut url = format!(
            "{}/datasets/{}/layers/{}",
            self.base_url,
            urlencoding::encode(dataset),
            urlencoding::encode(layer)
        );
        if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
            url.push_str("?CQL_FILTER=");
            url.push_str(&urlencoding::encode(filter));
        }
        url
    }
}

#[async_trait]
impl DatasetFeed for HttpDatasetFeed {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, FeedError> {
        let body = self
            .client
            .get_json(&format!("{}/datasets", self.base_url), None)
            .await?;
        Ok(Dataset::list_from_json(&body))
    }

    async fn list_layers(&self, dataset: &str) -> Result<Vec<Layer>, FeedError> {
        let url = format!(
            "{}/datasets/{}/layers",
            self.base_url,
            urlencoding::encode(dataset)
        );
        let body = self.client.get_json(&url, None).await?;
        Ok(Layer::list_from_json(&body))
    }

    async fn layer_features(
        &self,
        dataset: &str,
        layer: &str,
        filter: Option<&str>,
    ) -> Result<FeatureCollection, FeedError> {
        let url = self.build_layer_url(dataset, layer, filter);
        tracing::debug!("Fetching layer features: {}", url);
        let body = self.client.get_json(&url, None).await?;
        Ok(FeatureCollection::from_json(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::feed_client::test_server;
    use axum::extract::{Path, Query};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn feed(base: String) -> HttpDatasetFeed {
        HttpDatasetFeed::new(FeedClient::new(Duration::from_secs(2)).unwrap(), base)
    }

    #[test]
    fn test_build_layer_url() {
        let feed = feed("https://data.example/".to_string());
        assert_eq!(
            feed.build_layer_url("d1", "l 2", Some("noise_level > 70")),
            "https://data.example/datasets/d1/layers/l%202?CQL_FILTER=noise_level%20%3E%2070"
        );
        assert_eq!(
            feed.build_layer_url("d1", "l2", Some("  ")),
            "https://data.example/datasets/d1/layers/l2"
        );
    }

    #[tokio::test]
    async fn test_catalogue_and_filtered_features() {
        let router = Router::new()
            .route("/datasets", get(|| async { Json(json!([{"dataset_id": "d1", "name": "Survey"}])) }))
            .route(
                "/datasets/:id/layers",
                get(|Path(id): Path<String>| async move {
                    Json(json!({"layers": [{"layer_id": format!("{}-roads", id)}]}))
                }),
            )
            .route(
                "/datasets/:id/layers/:layer",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let mut features = vec![json!({
                        "type": "Feature",
                        "geometry": {"type": "Point", "coordinates": [100.0, 13.0]},
                        "properties": {"noise_level": 80}
                    })];
                    if !params.contains_key("CQL_FILTER") {
                        features.push(json!({
                            "type": "Feature",
                            "geometry": {"type": "Point", "coordinates": [100.1, 13.1]},
                            "properties": {"noise_level": 40}
                        }));
                    }
                    Json(json!({"type": "FeatureCollection", "features": features}))
                }),
            );
        let feed = feed(test_server::spawn(router).await);

        let datasets = feed.list_datasets().await.unwrap();
        assert_eq!(datasets[0].name, "Survey");

        let layers = feed.list_layers("d1").await.unwrap();
        assert_eq!(layers[0].id, "d1-roads");

        assert_eq!(feed.layer_features("d1", "d1-roads", None).await.unwrap().len(), 2);
        let filtered = feed
            .layer_features("d1", "d1-roads", Some("noise_level > 70"))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.features[0].value(), Some(80.0));
    }
}
