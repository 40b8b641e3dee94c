// Resolution-adaptive hex aggregation of dataset layers
use crate::application::render_surface::{
    CellShape, FeatureShape, FeatureStyle, LayerHandle, RenderSurface, Shape,
};
use crate::domain::geometry::{Coordinate, Feature, FeatureCollection};
use crate::domain::staleness::{color_for, MarkerStyle};
use h3o::{CellIndex, LatLng, Resolution};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Aggregation granularity for one zoom level. `RawPoints` is the finest tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Hex(Resolution),
    RawPoints,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Hex(resolution) => write!(f, "h3:{}", u8::from(*resolution)),
            Tier::RawPoints => f.write_str("raw"),
        }
    }
}

impl Serialize for Tier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Step function from zoom level to [`Tier`]: each step covers zoom levels up
/// to and including its bound; anything past the last step renders raw points.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionLadder {
    steps: [(u8, Resolution); 7],
}

impl ResolutionLadder {
    pub fn tier_for(&self, zoom: u8) -> Tier {
        self.steps
            .iter()
            .find(|(max_zoom, _)| zoom <= *max_zoom)
            .map(|(_, resolution)| Tier::Hex(*resolution))
            .unwrap_or(Tier::RawPoints)
    }
}

impl Default for ResolutionLadder {
    fn default() -> Self {
        Self {
            steps: [
                (5, Resolution::Three),
                (7, Resolution::Four),
                (9, Resolution::Five),
                (11, Resolution::Six),
                (13, Resolution::Seven),
                (15, Resolution::Eight),
                (17, Resolution::Nine),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HexCell {
    pub index: CellIndex,
    pub count: usize,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellStats {
    pub count: usize,
    pub average: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl HexCell {
    fn new(index: CellIndex) -> Self {
        Self {
            index,
            count: 0,
            values: Vec::new(),
        }
    }

    pub fn stats(&self) -> CellStats {
        let (average, min, max) = if self.values.is_empty() {
            (None, None, None)
        } else {
            let n = self.values.len() as f64;
            (
                Some(self.values.iter().sum::<f64>() / n),
                Some(self.values.iter().copied().fold(f64::INFINITY, f64::min)),
                Some(self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            )
        };
        CellStats {
            count: self.count,
            average,
            min,
            max,
        }
    }

    /// Fill opacity grows with the count, capped so the basemap stays visible.
    pub fn opacity(&self) -> f64 {
        (0.3 + 0.05 * self.count as f64).min(0.8)
    }

    fn shape(&self) -> CellShape {
        let stats = self.stats();
        let center = LatLng::from(self.index);
        let boundary = self
            .index
            .boundary()
            .iter()
            .filter_map(|ll| Coordinate::new(ll.lat(), ll.lng()))
            .collect();

        CellShape {
            cell: self.index.to_string(),
            resolution: u8::from(self.index.resolution()),
            boundary,
            // Cell centers are always valid WGS84
            center: Coordinate {
                lat: center.lat(),
                lon: center.lng(),
            },
            label: self.count.to_string(),
            count: stats.count,
            average: stats.average,
            min: stats.min,
            max: stats.max,
            fill_color: color_for(stats.average).hex(),
            fill_opacity: self.opacity(),
        }
    }
}

/// Result of binning one feature collection at one resolution.
#[derive(Debug, Default)]
pub struct Binning {
    pub cells: HashMap<CellIndex, HexCell>,
    pub accepted: usize,
    pub skipped: usize,
}

impl Binning {
    pub fn total_count(&self) -> usize {
        self.cells.values().map(|c| c.count).sum()
    }

    /// Cells ordered by index, for stable rendering.
    pub fn sorted_cells(&self) -> Vec<&HexCell> {
        let mut cells: Vec<&HexCell> = self.cells.values().collect();
        cells.sort_by_key(|c| u64::from(c.index));
        cells
    }
}

/// Bins every in-range coordinate of every feature. Each coordinate carries
/// its feature's value; out-of-range coordinates are counted as skipped.
pub fn bin_features(collection: &FeatureCollection, resolution: Resolution) -> Binning {
    let mut binning = Binning::default();

    for feature in &collection.features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let value = feature.value();

        geometry.for_each_position(&mut |position| {
            let latlng = Coordinate::from_position(position)
                .and_then(|c| LatLng::new(c.lat, c.lon).ok());
            let Some(latlng) = latlng else {
                binning.skipped += 1;
                return;
            };

            let index = latlng.to_cell(resolution);
            let cell = binning.cells.entry(index).or_insert_with(|| HexCell::new(index));
            cell.count += 1;
            if let Some(v) = value {
                cell.values.push(v);
            }
            binning.accepted += 1;
        });
    }

    binning
}

/// A shown layer: the dataset it was fetched from plus its layer id.
/// Layer ids are only unique within one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LayerKey {
    pub dataset: String,
    pub layer: String,
}

impl LayerKey {
    pub fn new(dataset: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            layer: layer.into(),
        }
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dataset, self.layer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    pub layer: LayerKey,
    pub tier: Tier,
    pub cells: usize,
    pub features: usize,
    pub skipped: usize,
    pub cleared: usize,
}

#[derive(Debug)]
struct RenderedLayer {
    tier: Tier,
    handles: Vec<LayerHandle>,
}

#[derive(Debug)]
struct LayerState {
    features: FeatureCollection,
    rendered: Option<RenderedLayer>,
}

/// Owns the layer key → rendered layer mapping for the dataset view.
///
/// Every layer keeps its original feature collection and is rebuilt from it
/// on each zoom change; nothing carries over between resolutions.
#[derive(Debug)]
pub struct HexAggregator {
    ladder: ResolutionLadder,
    zoom: u8,
    layers: BTreeMap<LayerKey, LayerState>,
}

impl HexAggregator {
    pub fn new(ladder: ResolutionLadder, zoom: u8) -> Self {
        Self {
            ladder,
            zoom,
            layers: BTreeMap::new(),
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn tier(&self) -> Tier {
        self.ladder.tier_for(self.zoom)
    }

    pub fn layer_keys(&self) -> Vec<LayerKey> {
        self.layers.keys().cloned().collect()
    }

    pub fn rendered_tier(&self, layer: &LayerKey) -> Option<Tier> {
        self.layers
            .get(layer)
            .and_then(|state| state.rendered.as_ref())
            .map(|r| r.tier)
    }

    pub fn handles(&self, layer: &LayerKey) -> Vec<LayerHandle> {
        self.layers
            .get(layer)
            .and_then(|state| state.rendered.as_ref())
            .map(|r| r.handles.clone())
            .unwrap_or_default()
    }

    pub fn feature(&self, layer: &LayerKey, index: usize) -> Option<&Feature> {
        self.layers.get(layer)?.features.features.get(index)
    }

    /// Shows a layer, or replaces its retained features (e.g. after a filter).
    pub fn set_layer<S>(&mut self, surface: &mut S, layer: &LayerKey, features: FeatureCollection) -> RebuildReport
    where
        S: RenderSurface + ?Sized,
    {
        let cleared = self
            .layers
            .remove(layer)
            .map(|mut state| clear_rendered(surface, &mut state))
            .unwrap_or(0);

        self.layers.insert(
            layer.clone(),
            LayerState {
                features,
                rendered: None,
            },
        );
        let mut report = self.rebuild(surface, layer);
        report.cleared += cleared;
        report
    }

    pub fn remove_layer<S>(&mut self, surface: &mut S, layer: &LayerKey) -> bool
    where
        S: RenderSurface + ?Sized,
    {
        match self.layers.remove(layer) {
            Some(mut state) => {
                let cleared = clear_rendered(surface, &mut state);
                tracing::debug!("Removed layer {} ({} shapes)", layer, cleared);
                true
            }
            None => false,
        }
    }

    /// Records the new zoom level and rebuilds every shown layer.
    pub fn set_zoom<S>(&mut self, surface: &mut S, zoom: u8) -> Vec<RebuildReport>
    where
        S: RenderSurface + ?Sized,
    {
        if zoom == self.zoom {
            return Vec::new();
        }
        self.zoom = zoom;
        self.layer_keys()
            .iter()
            .map(|layer| self.rebuild(surface, layer))
            .collect()
    }

    /// Hides every layer.
    pub fn clear<S>(&mut self, surface: &mut S) -> usize
    where
        S: RenderSurface + ?Sized,
    {
        let mut cleared = 0;
        for (_, mut state) in std::mem::take(&mut self.layers) {
            cleared += clear_rendered(surface, &mut state);
        }
        cleared
    }

    fn rebuild<S>(&mut self, surface: &mut S, layer: &LayerKey) -> RebuildReport
    where
        S: RenderSurface + ?Sized,
    {
        let tier = self.tier();
        let mut report = RebuildReport {
            layer: layer.clone(),
            tier,
            cells: 0,
            features: 0,
            skipped: 0,
            cleared: 0,
        };
        let Some(state) = self.layers.get_mut(layer) else {
            return report;
        };

        // Old shapes go before any new one is drawn
        report.cleared = clear_rendered(surface, state);

        let handles = match tier {
            Tier::RawPoints => {
                let handles = render_raw(surface, &state.features);
                report.features = handles.len();
                report.skipped = state.features.len() - handles.len();
                handles
            }
            Tier::Hex(resolution) => {
                let binning = bin_features(&state.features, resolution);
                report.cells = binning.cells.len();
                report.skipped = binning.skipped;
                binning
                    .sorted_cells()
                    .into_iter()
                    .map(|cell| surface.add(Shape::Cell(cell.shape())))
                    .collect()
            }
        };

        tracing::debug!(
            "Rebuilt layer {} at {}: {} cells, {} raw features, {} skipped, {} cleared",
            layer,
            tier,
            report.cells,
            report.features,
            report.skipped,
            report.cleared
        );
        state.rendered = Some(RenderedLayer { tier, handles });
        report
    }
}

fn clear_rendered<S>(surface: &mut S, state: &mut LayerState) -> usize
where
    S: RenderSurface + ?Sized,
{
    state
        .rendered
        .take()
        .map(|rendered| {
            rendered
                .handles
                .into_iter()
                .filter(|handle| surface.remove(*handle))
                .count()
        })
        .unwrap_or(0)
}

/// One shape per feature with at least one valid coordinate.
fn render_raw<S>(surface: &mut S, collection: &FeatureCollection) -> Vec<LayerHandle>
where
    S: RenderSurface + ?Sized,
{
    collection
        .features
        .iter()
        .filter_map(|feature| {
            let geometry = feature.geometry.as_ref()?;
            if geometry.coordinates().is_empty() {
                return None;
            }
            let style = if geometry.is_point() {
                FeatureStyle::Point(MarkerStyle::for_feature_point(feature.value()))
            } else {
                FeatureStyle::outline()
            };
            Some(surface.add(Shape::Feature(FeatureShape {
                geometry: geometry.clone(),
                style,
                properties: feature.properties.clone(),
            })))
        })
        .collect()
}
