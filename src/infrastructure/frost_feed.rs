// HTTP sensor feed (FROST proxy) implementation
use crate::application::feed_repository::{FeedError, SensorFeed};
use crate::domain::observation::{parse_observations, Observation, ThingId};
use crate::infrastructure::feed_client::FeedClient;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct HttpSensorFeed {
    client: FeedClient,
    url: String,
    token: Option<String>,
}

impl HttpSensorFeed {
    pub fn new(client: FeedClient, url: String, token: Option<String>) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn build_history_url(&self, thing: &ThingId, limit: usize) -> String {
        format!(
            "{}?thingId={}&limit={}",
            self.url,
            urlencoding::encode(&thing.0),
            limit
        )
    }
}

#[async_trait]
impl SensorFeed for HttpSensorFeed {
    async fn latest(&self) -> Result<Vec<Observation>, FeedError> {
        let body = self.client.get_json(&self.url, self.token.as_deref()).await?;
        let observations = parse_observations(&body);
        tracing::debug!("Sensor feed returned {} observations", observations.len());
        Ok(observations)
    }

    async fn history(&self, thing: &ThingId, limit: usize) -> Result<Vec<Observation>, FeedError> {
        let url = self.build_history_url(thing, limit);
        let body = self.client.get_json(&url, self.token.as_deref()).await?;
        Ok(parse_observations(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::feed_client::test_server;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    fn feed(url: String) -> HttpSensorFeed {
        HttpSensorFeed::new(FeedClient::new(Duration::from_secs(2)).unwrap(), url, None)
    }

    #[test]
    fn test_build_history_url() {
        let feed = feed("https://feed.example/frost/get/".to_string());
        assert_eq!(
            feed.build_history_url(&ThingId::from("a b"), 300),
            "https://feed.example/frost/get?thingId=a%20b&limit=300"
        );
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        let router = Router::new().route(
            "/frost/get",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let body: Value = match params.get("thingId") {
                    Some(id) => json!({"type": "FeatureCollection", "features": [
                        {"geometry": {"type": "Point", "coordinates": [100.5, 13.7]},
                         "properties": {"thingId": id.parse::<i64>().unwrap(), "datastreamName": "Sound",
                                        "result": 61.5, "phenomenonTime": "2025-01-01T00:00:00Z"}}
                    ]}),
                    None => json!({"type": "FeatureCollection", "features": [
                        {"geometry": {"type": "Point", "coordinates": [100.5, 13.7]},
                         "properties": {"thingId": 1, "thingName": "Gate", "datastreamName": "Sound", "value": 55}},
                        {"geometry": {"type": "Point", "coordinates": [100.6, 13.8]},
                         "properties": {"thingName": "orphan"}}
                    ]}),
                };
                Json(body)
            }),
        );
        let base = test_server::spawn(router).await;
        let feed = feed(format!("{}/frost/get", base));

        let latest = feed.latest().await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].thing_name.as_deref(), Some("Gate"));

        let history = feed.history(&ThingId::from("9"), 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].thing_id, ThingId::from("9"));
        assert_eq!(history[0].value, Some(61.5));
    }
}
