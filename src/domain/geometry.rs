// Geometry domain model - GeoJSON shapes and the coordinate extractor
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw GeoJSON position, `[lon, lat]` with an optional altitude.
pub type Position = Vec<f64>;

/// A validated WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Returns `None` unless latitude is in [-90, 90] and longitude in [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let in_range = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        in_range.then_some(Self { lat, lon })
    }

    /// Reads a GeoJSON position (longitude first).
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lon, lat, ..] => Self::new(*lat, *lon),
            _ => None,
        }
    }

    /// "lat, lon" with 4 decimals, as shown in detail panels.
    pub fn display(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
            Geometry::GeometryCollection { .. } => "GeometryCollection",
        }
    }

    /// Visits every raw position of the geometry, vertices included.
    ///
    /// This is the single place that knows how each geometry kind nests its
    /// positions; both the aggregator and the locator go through it.
    pub fn for_each_position<F>(&self, f: &mut F)
    where
        F: FnMut(&[f64]),
    {
        match self {
            Geometry::Point { coordinates } => f(coordinates.as_slice()),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().for_each(|p| f(p.as_slice()))
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => coordinates
                .iter()
                .flatten()
                .for_each(|p| f(p.as_slice())),
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .flatten()
                .flatten()
                .for_each(|p| f(p.as_slice())),
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.for_each_position(f);
                }
            }
        }
    }

    /// All positions that pass range validation, in document order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut out = Vec::new();
        self.for_each_position(&mut |p| {
            if let Some(c) = Coordinate::from_position(p) {
                out.push(c);
            }
        });
        out
    }

    /// Number of raw positions, valid or not.
    pub fn position_count(&self) -> usize {
        let mut n = 0;
        self.for_each_position(&mut |_| n += 1);
        n
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Geometry::Point { .. })
    }
}

/// A dataset feature: arbitrary geometry plus free-form properties.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Map<String, Value>,
}

// GeoJSON allows `"properties": null`
fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Property keys consulted, in order, for a feature's display value.
pub const VALUE_PROPERTIES: [&str; 2] = ["noise_level", "value"];

impl Feature {
    /// First numeric value among [`VALUE_PROPERTIES`]; numeric strings count.
    pub fn value(&self) -> Option<f64> {
        VALUE_PROPERTIES
            .iter()
            .filter_map(|key| self.properties.get(*key))
            .find_map(numeric)
    }
}

/// Reads a JSON number, or a string holding one.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Parses a GeoJSON feature collection, dropping features that fail to
    /// deserialize instead of failing the whole document.
    pub fn from_json(value: &Value) -> Self {
        let features = value
            .get("features")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match serde_json::from_value::<Feature>(item.clone()) {
                        Ok(feature) => Some(feature),
                        Err(e) => {
                            tracing::debug!("Discarding malformed feature: {}", e);
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coordinate_range() {
        assert!(Coordinate::new(90.0, 180.0).is_some());
        assert!(Coordinate::new(-90.0, -180.0).is_some());
        assert!(Coordinate::new(90.5, 0.0).is_none());
        assert!(Coordinate::new(0.0, -180.1).is_none());
        assert!(Coordinate::new(f64::NAN, 0.0).is_none());
        assert!(Coordinate::from_position(&[100.5]).is_none());

        let c = Coordinate::from_position(&[100.5018, 13.7563, 4.0]).unwrap();
        assert_eq!(c.lat, 13.7563);
        assert_eq!(c.lon, 100.5018);
        assert_eq!(c.display(), "13.7563, 100.5018");
    }

    #[test]
    fn test_extractor_visits_every_vertex() {
        let polygon: Geometry = serde_json::from_value(json!({
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[5.0, 5.0], [6.0, 5.0], [500.0, 6.0], [5.0, 5.0]]]
            ]
        }))
        .unwrap();

        assert_eq!(polygon.kind(), "MultiPolygon");
        assert_eq!(polygon.position_count(), 8);
        // One longitude is out of range
        assert_eq!(polygon.coordinates().len(), 7);

        let collection: Geometry = serde_json::from_value(json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [1.0, 2.0]},
                {"type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]]}
            ]
        }))
        .unwrap();
        assert_eq!(collection.coordinates().len(), 3);
    }

    #[test]
    fn test_feature_value_prefers_noise_level() {
        let feature: Feature = serde_json::from_value(json!({
            "geometry": null,
            "properties": {"value": 10, "noise_level": "72.5"}
        }))
        .unwrap();
        assert_eq!(feature.value(), Some(72.5));

        let feature: Feature = serde_json::from_value(json!({
            "properties": {"noise_level": "n/a", "value": 41}
        }))
        .unwrap();
        assert_eq!(feature.value(), Some(41.0));

        let feature: Feature = serde_json::from_value(json!({"properties": {}})).unwrap();
        assert_eq!(feature.value(), None);
    }

    #[test]
    fn test_collection_skips_malformed_features() {
        let body = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}, "properties": {}},
                {"type": "Feature", "geometry": {"type": "Hexagon", "coordinates": []}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [3.0, 4.0]}, "properties": null}
            ]
        });
        let collection = FeatureCollection::from_json(&body);
        assert_eq!(collection.len(), 2);

        assert!(FeatureCollection::from_json(&json!({})).is_empty());
    }
}
