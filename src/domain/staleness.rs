// Staleness classifier - online flag and value color ladder
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Value-band color classes, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBand {
    Quiet,
    Moderate,
    Loud,
    VeryLoud,
    Unknown,
    Offline,
}

impl ColorBand {
    pub fn hex(self) -> &'static str {
        match self {
            ColorBand::Quiet => "#2ecc71",
            ColorBand::Moderate => "#f1c40f",
            ColorBand::Loud => "#e67e22",
            ColorBand::VeryLoud => "#e74c3c",
            ColorBand::Unknown => "#777777",
            ColorBand::Offline => "#9e9e9e",
        }
    }
}

/// Upper bounds (exclusive) of the first three bands; anything above is `VeryLoud`.
const BAND_LIMITS: [(f64, ColorBand); 3] = [
    (55.0, ColorBand::Quiet),
    (70.0, ColorBand::Moderate),
    (85.0, ColorBand::Loud),
];

pub fn color_for(value: Option<f64>) -> ColorBand {
    let Some(value) = value else {
        return ColorBand::Unknown;
    };
    BAND_LIMITS
        .iter()
        .find(|(limit, _)| value < *limit)
        .map(|(_, band)| *band)
        .unwrap_or(ColorBand::VeryLoud)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessPolicy {
    pub offline_threshold: Duration,
}

impl StalenessPolicy {
    pub fn new(offline_threshold: Duration) -> Self {
        Self { offline_threshold }
    }

    pub fn is_online(&self, time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        time.is_some_and(|t| now - t <= self.offline_threshold)
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::milliseconds(15_000))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub band: ColorBand,
    pub fill_color: &'static str,
    pub stroke_color: &'static str,
    pub fill_opacity: f64,
    pub radius: u32,
    pub weight: u32,
}

impl MarkerStyle {
    /// Offline entities always get the muted color, whatever their value.
    pub fn for_reading(value: Option<f64>, online: bool) -> Self {
        let band = if online { color_for(value) } else { ColorBand::Offline };
        Self {
            band,
            fill_color: band.hex(),
            stroke_color: "#ffffff",
            fill_opacity: if online { 0.8 } else { 0.4 },
            radius: 10,
            weight: 2,
        }
    }

    /// Raw dataset point, colored by its own value.
    pub fn for_feature_point(value: Option<f64>) -> Self {
        let band = color_for(value);
        Self {
            band,
            fill_color: band.hex(),
            stroke_color: "#ffffff",
            fill_opacity: 0.8,
            radius: 8,
            weight: 2,
        }
    }
}

/// "12s ago", "5m ago", "3h ago", or the calendar date past a day.
pub fn format_age(time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(time) = time else {
        return "-".to_string();
    };
    let secs = (now - time).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s ago", s),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        _ => time.format("%Y-%m-%d").to_string(),
    }
}
