// Domain layer - feed data shapes and pure classification rules
pub mod catalog;
pub mod geometry;
pub mod history;
pub mod observation;
pub mod staleness;
pub mod thing;
