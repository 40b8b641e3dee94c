// Repository traits for the sensor and dataset feeds
use crate::domain::catalog::{Dataset, Layer};
use crate::domain::geometry::FeatureCollection;
use crate::domain::observation::{Observation, ThingId};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("feed rejected the credentials")]
    Unauthorized,
    #[error("feed returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unparseable feed body: {0}")]
    Parse(String),
}

impl FeedError {
    /// Errors that should stop polling rather than skip one cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::Unauthorized)
    }
}

#[async_trait]
pub trait SensorFeed: Send + Sync {
    /// Latest reading of every entity
    async fn latest(&self) -> Result<Vec<Observation>, FeedError>;

    /// Recent readings of one entity, up to `limit` per signal
    async fn history(&self, thing: &ThingId, limit: usize) -> Result<Vec<Observation>, FeedError>;
}

#[async_trait]
pub trait DatasetFeed: Send + Sync {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, FeedError>;

    async fn list_layers(&self, dataset: &str) -> Result<Vec<Layer>, FeedError>;

    /// Features of one layer, optionally narrowed by a filter expression
    async fn layer_features(
        &self,
        dataset: &str,
        layer: &str,
        filter: Option<&str>,
    ) -> Result<FeatureCollection, FeedError>;
}
