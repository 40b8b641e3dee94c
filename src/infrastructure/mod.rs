// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod dataset_api;
pub mod feed_client;
pub mod frost_feed;
pub mod http_response;
pub mod scene;
