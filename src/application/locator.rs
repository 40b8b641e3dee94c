// Feature locator - "zoom to this feature"
use crate::domain::geometry::{Coordinate, Feature};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const TILE_SIZE: f64 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn around(coordinates: &[Coordinate]) -> Option<Self> {
        let first = coordinates.first()?;
        let init = Bounds {
            south: first.lat,
            west: first.lon,
            north: first.lat,
            east: first.lon,
        };
        Some(coordinates.iter().fold(init, |b, c| Bounds {
            south: b.south.min(c.lat),
            west: b.west.min(c.lon),
            north: b.north.max(c.lat),
            east: b.east.max(c.lon),
        }))
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            lat: (self.south + self.north) / 2.0,
            lon: (self.west + self.east) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "fit", rename_all = "snake_case")]
pub enum ViewFit {
    Center { center: Coordinate, zoom: u8 },
    Bounds { bounds: Bounds, padding_px: u32, max_zoom: u8 },
}

fn mercator_y(lat: f64) -> f64 {
    let s = lat.to_radians().sin().clamp(-0.9999, 0.9999);
    0.5 * ((1.0 + s) / (1.0 - s)).ln()
}

impl ViewFit {
    pub fn center(&self) -> Coordinate {
        match self {
            ViewFit::Center { center, .. } => *center,
            ViewFit::Bounds { bounds, .. } => bounds.center(),
        }
    }

    /// Largest web-mercator zoom at which the fit is fully visible in the
    /// viewport, never above the fit's own cap.
    pub fn zoom_for(&self, viewport: Viewport) -> u8 {
        let (bounds, padding, max_zoom) = match self {
            ViewFit::Center { zoom, .. } => return *zoom,
            ViewFit::Bounds {
                bounds,
                padding_px,
                max_zoom,
            } => (bounds, *padding_px, *max_zoom),
        };

        let avail_w = viewport.width.saturating_sub(2 * padding).max(1) as f64;
        let avail_h = viewport.height.saturating_sub(2 * padding).max(1) as f64;
        let lon_frac = (bounds.east - bounds.west) / 360.0;
        let y_frac = (mercator_y(bounds.north) - mercator_y(bounds.south)) / (2.0 * PI);

        let fit = |avail: f64, frac: f64| {
            if frac > 0.0 {
                (avail / (TILE_SIZE * frac)).log2()
            } else {
                f64::INFINITY
            }
        };
        let zoom = fit(avail_w, lon_frac).min(fit(avail_h, y_frac)).floor();
        zoom.clamp(0.0, max_zoom as f64) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureLocator {
    pub point_zoom: u8,
    pub max_fit_zoom: u8,
    pub padding_px: u32,
}

impl Default for FeatureLocator {
    fn default() -> Self {
        Self {
            point_zoom: 16,
            max_fit_zoom: 16,
            padding_px: 50,
        }
    }
}

impl FeatureLocator {
    /// `None` when the feature has no usable coordinate.
    pub fn locate(&self, feature: &Feature) -> Option<ViewFit> {
        let geometry = feature.geometry.as_ref()?;
        let coordinates = geometry.coordinates();

        if geometry.is_point() {
            return coordinates.first().map(|center| ViewFit::Center {
                center: *center,
                zoom: self.point_zoom,
            });
        }

        Bounds::around(&coordinates).map(|bounds| ViewFit::Bounds {
            bounds,
            padding_px: self.padding_px,
            max_zoom: self.max_fit_zoom,
        })
    }
}
