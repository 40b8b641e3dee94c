// Application layer - view state, feed contracts and the refresh loop
pub mod feed_repository;
pub mod hex_aggregator;
pub mod layer_service;
pub mod locator;
pub mod map_view;
pub mod marker_sync;
pub mod poller;
pub mod render_surface;
