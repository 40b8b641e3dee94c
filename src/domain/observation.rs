// Observation domain model - one raw point reading from the sensor feed
use crate::domain::geometry::{numeric, Coordinate, Geometry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable entity key. The feed sends numeric or string ids; both end up here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThingId(pub String);

impl ThingId {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub thing_id: ThingId,
    pub thing_name: Option<String>,
    pub signal_id: Option<String>,
    pub signal_name: Option<String>,
    pub value: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub coordinate: Coordinate,
}

#[derive(Debug, Deserialize)]
struct RawSensorFeature {
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: RawSensorProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSensorProperties {
    #[serde(default)]
    thing_id: Option<Value>,
    #[serde(default)]
    thing_name: Option<String>,
    #[serde(default)]
    datastream_id: Option<Value>,
    #[serde(default)]
    datastream_name: Option<String>,
    // History responses use the FROST names
    #[serde(default, alias = "result")]
    value: Option<Value>,
    #[serde(default, alias = "phenomenonTime")]
    time: Option<String>,
}

impl Observation {
    /// Reads one GeoJSON feature. Features without an entity id or a usable
    /// point are dropped (`None`), never reported as errors.
    pub fn from_feature(feature: &Value) -> Option<Self> {
        let raw: RawSensorFeature = serde_json::from_value(feature.clone()).ok()?;
        let props = raw.properties;

        let thing_id = props.thing_id.as_ref().and_then(ThingId::from_json)?;
        let coordinate = match raw.geometry? {
            Geometry::Point { coordinates } => Coordinate::from_position(&coordinates)?,
            _ => return None,
        };

        Some(Self {
            thing_id,
            thing_name: props.thing_name,
            signal_id: props.datastream_id.as_ref().and_then(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }),
            signal_name: props.datastream_name,
            value: props.value.as_ref().and_then(numeric),
            time: props.time.as_deref().and_then(parse_time),
            coordinate,
        })
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    // phenomenonTime may be an interval "start/end"; the end is the reading time
    let instant = raw.rsplit('/').next().unwrap_or(raw);
    DateTime::parse_from_rfc3339(instant)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Parses a feed body into observations, dropping malformed features.
pub fn parse_observations(body: &Value) -> Vec<Observation> {
    let Some(features) = body.get("features").and_then(Value::as_array) else {
        return Vec::new();
    };

    let observations: Vec<Observation> = features.iter().filter_map(Observation::from_feature).collect();

    let dropped = features.len() - observations.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} of {} sensor features", dropped, features.len());
    }
    observations
}
