// Render surface trait - the map the synchronizer and aggregator draw on
use crate::domain::geometry::{Coordinate, Geometry};
use crate::domain::staleness::MarkerStyle;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identity of one rendered object. Stable for the object's whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerHandle(pub u64);

impl fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerShape {
    pub position: Coordinate,
    pub style: MarkerStyle,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellShape {
    pub cell: String,
    pub resolution: u8,
    pub boundary: Vec<Coordinate>,
    pub center: Coordinate,
    pub label: String,
    pub count: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub fill_color: &'static str,
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureStyle {
    Point(MarkerStyle),
    Outline {
        stroke_color: &'static str,
        fill_color: &'static str,
        fill_opacity: f64,
        weight: u32,
    },
}

impl FeatureStyle {
    pub fn outline() -> Self {
        FeatureStyle::Outline {
            stroke_color: "#1E3A8A",
            fill_color: "#3B82F6",
            fill_opacity: 0.4,
            weight: 2,
        }
    }
}

/// A dataset feature drawn as-is (finest zoom tier).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureShape {
    pub geometry: Geometry,
    pub style: FeatureStyle,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Marker(MarkerShape),
    Cell(CellShape),
    Feature(FeatureShape),
}

/// Everything the sensor and dataset components need from a map.
///
/// Implementations own the drawn objects; callers only keep handles.
pub trait RenderSurface: Send {
    fn add(&mut self, shape: Shape) -> LayerHandle;

    /// Moves and restyles a marker in place. Returns false for unknown handles.
    fn update_marker(&mut self, handle: LayerHandle, position: Coordinate, style: MarkerStyle) -> bool;

    fn is_popup_open(&self, handle: LayerHandle) -> bool;

    fn open_popup(&mut self, handle: LayerHandle);

    fn set_popup_content(&mut self, handle: LayerHandle, content: String);

    fn remove(&mut self, handle: LayerHandle) -> bool;

    fn contains(&self, handle: LayerHandle) -> bool;
}
