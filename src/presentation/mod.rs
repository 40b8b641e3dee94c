// Presentation layer - HTTP surface over the map view
pub mod app_state;
pub mod handlers;
pub mod router;
