// Map view actor - the single owner of the render surface and its components
use crate::application::hex_aggregator::{HexAggregator, LayerKey, RebuildReport, ResolutionLadder, Tier};
use crate::application::locator::{FeatureLocator, ViewFit, Viewport};
use crate::application::marker_sync::{MarkerSynchronizer, SyncReport};
use crate::application::render_surface::LayerHandle;
use crate::domain::geometry::{Feature, FeatureCollection};
use crate::domain::observation::{Observation, ThingId};
use crate::domain::thing::{EntityAssembler, Thing};
use crate::infrastructure::scene::{InMemorySurface, SceneEntry, SceneStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Sensor,
    Dataset,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("map view has stopped")]
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneView {
    pub mode: ViewMode,
    pub zoom: u8,
    pub tier: Tier,
    pub layers: Vec<LayerKey>,
    pub filter: Option<String>,
    pub current: Option<ThingId>,
    pub stats: SceneStats,
    pub entries: Vec<SceneEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedFeature {
    pub layer: LayerKey,
    pub index: usize,
    pub feature: Feature,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedFeature {
    pub layer: LayerKey,
    pub index: usize,
    pub fit: ViewFit,
    pub zoom: u8,
}

pub enum ViewCommand {
    Snapshot {
        observations: Vec<Observation>,
        fetched_at: DateTime<Utc>,
        reply: oneshot::Sender<Option<SyncReport>>,
    },
    SetZoom {
        zoom: u8,
        reply: oneshot::Sender<Vec<RebuildReport>>,
    },
    SetMode {
        mode: ViewMode,
        reply: oneshot::Sender<usize>,
    },
    ShowLayer {
        layer: LayerKey,
        features: FeatureCollection,
        reply: oneshot::Sender<RebuildReport>,
    },
    HideLayer {
        layer: LayerKey,
        reply: oneshot::Sender<bool>,
    },
    SetFilter {
        filter: Option<String>,
        reply: oneshot::Sender<Vec<LayerKey>>,
    },
    ActiveFilter {
        reply: oneshot::Sender<Option<String>>,
    },
    Click {
        handle: LayerHandle,
        reply: oneshot::Sender<Option<Thing>>,
    },
    CurrentThing {
        reply: oneshot::Sender<Option<Thing>>,
    },
    LookupThing {
        id: ThingId,
        reply: oneshot::Sender<Option<Thing>>,
    },
    CurrentFeature {
        reply: oneshot::Sender<Option<SelectedFeature>>,
    },
    Locate {
        layer: LayerKey,
        index: usize,
        viewport: Viewport,
        reply: oneshot::Sender<Option<LocatedFeature>>,
    },
    Scene {
        reply: oneshot::Sender<SceneView>,
    },
    Stop {
        reply: oneshot::Sender<usize>,
    },
}

/// Runs every marker and layer mutation in arrival order, one at a time.
pub struct MapView {
    surface: InMemorySurface,
    assembler: EntityAssembler,
    synchronizer: MarkerSynchronizer,
    aggregator: HexAggregator,
    locator: FeatureLocator,
    mode: ViewMode,
    current_feature: Option<(LayerKey, usize)>,
    filter: Option<String>,
    refresh: Arc<Notify>,
}

impl MapView {
    pub fn new(
        assembler: EntityAssembler,
        locator: FeatureLocator,
        ladder: ResolutionLadder,
        initial_zoom: u8,
    ) -> Self {
        Self {
            surface: InMemorySurface::new(),
            assembler,
            synchronizer: MarkerSynchronizer::new(),
            aggregator: HexAggregator::new(ladder, initial_zoom),
            locator,
            mode: ViewMode::Sensor,
            current_feature: None,
            filter: None,
            refresh: Arc::new(Notify::new()),
        }
    }

    /// Spawns the view task. The task ends on `stop()` or once every handle
    /// has been dropped.
    pub fn start(self) -> (MapViewHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let refresh = self.refresh.clone();
        let task = tokio::spawn(self.run(rx));
        (MapViewHandle { tx, refresh }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ViewCommand>) {
        tracing::info!("Map view started at zoom {} ({})", self.aggregator.zoom(), self.aggregator.tier());
        while let Some(command) = rx.recv().await {
            if let ViewCommand::Stop { reply } = command {
                let cleared = self.teardown();
                let _ = reply.send(cleared);
                break;
            }
            self.handle(command);
        }
        if !self.surface.is_empty() {
            self.teardown();
        }
        tracing::info!("Map view stopped");
    }

    fn handle(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::Snapshot {
                observations,
                fetched_at,
                reply,
            } => {
                let _ = reply.send(self.apply_snapshot(observations, fetched_at));
            }
            ViewCommand::SetZoom { zoom, reply } => {
                let _ = reply.send(self.aggregator.set_zoom(&mut self.surface, zoom));
            }
            ViewCommand::SetMode { mode, reply } => {
                let _ = reply.send(self.set_mode(mode));
            }
            ViewCommand::ShowLayer {
                layer,
                features,
                reply,
            } => {
                self.set_mode(ViewMode::Dataset);
                if self.current_feature.as_ref().is_some_and(|(l, _)| *l == layer) {
                    self.current_feature = None;
                }
                let report = self.aggregator.set_layer(&mut self.surface, &layer, features);
                let _ = reply.send(report);
            }
            ViewCommand::HideLayer { layer, reply } => {
                if self.current_feature.as_ref().is_some_and(|(l, _)| *l == layer) {
                    self.current_feature = None;
                }
                let _ = reply.send(self.aggregator.remove_layer(&mut self.surface, &layer));
            }
            ViewCommand::SetFilter { filter, reply } => {
                tracing::info!("Layer filter set to {:?}", filter);
                self.filter = filter;
                let _ = reply.send(self.aggregator.layer_keys());
            }
            ViewCommand::ActiveFilter { reply } => {
                let _ = reply.send(self.filter.clone());
            }
            ViewCommand::Click { handle, reply } => {
                let thing = self.synchronizer.click(&mut self.surface, handle).cloned();
                let _ = reply.send(thing);
            }
            ViewCommand::CurrentThing { reply } => {
                let _ = reply.send(self.synchronizer.current().cloned());
            }
            ViewCommand::LookupThing { id, reply } => {
                let _ = reply.send(self.synchronizer.get(&id).cloned());
            }
            ViewCommand::CurrentFeature { reply } => {
                let _ = reply.send(self.current_feature());
            }
            ViewCommand::Locate {
                layer,
                index,
                viewport,
                reply,
            } => {
                let _ = reply.send(self.locate(layer, index, viewport));
            }
            ViewCommand::Scene { reply } => {
                let _ = reply.send(self.scene());
            }
            ViewCommand::Stop { reply } => {
                let _ = reply.send(self.teardown());
            }
        }
    }

    fn apply_snapshot(&mut self, observations: Vec<Observation>, fetched_at: DateTime<Utc>) -> Option<SyncReport> {
        if self.mode != ViewMode::Sensor {
            tracing::debug!("Dropping sensor snapshot of {} observations in dataset mode", observations.len());
            return None;
        }
        let things = self.assembler.assemble(observations, fetched_at);
        Some(self.synchronizer.sync(&mut self.surface, things, fetched_at))
    }

    /// Switches mode and clears the other component's shapes. Returning to
    /// sensor mode asks the poller for an immediate snapshot.
    fn set_mode(&mut self, mode: ViewMode) -> usize {
        if mode == self.mode {
            return 0;
        }
        let cleared = match mode {
            ViewMode::Dataset => self.synchronizer.clear(&mut self.surface),
            ViewMode::Sensor => {
                self.current_feature = None;
                let cleared = self.aggregator.clear(&mut self.surface);
                self.refresh.notify_one();
                cleared
            }
        };
        tracing::info!("Switched to {:?} mode, cleared {} shapes", mode, cleared);
        self.mode = mode;
        cleared
    }

    fn current_feature(&self) -> Option<SelectedFeature> {
        let (layer, index) = self.current_feature.as_ref()?;
        let feature = self.aggregator.feature(layer, *index)?;
        Some(SelectedFeature {
            layer: layer.clone(),
            index: *index,
            feature: feature.clone(),
        })
    }

    /// Fits the view to one retained feature and makes it the current feature.
    fn locate(&mut self, layer: LayerKey, index: usize, viewport: Viewport) -> Option<LocatedFeature> {
        let feature = self.aggregator.feature(&layer, index)?;
        let Some(fit) = self.locator.locate(feature) else {
            match &feature.geometry {
                Some(geometry) => tracing::debug!(
                    "{} feature {} of layer {} has no valid coordinate among {} positions",
                    geometry.kind(),
                    index,
                    layer,
                    geometry.position_count()
                ),
                None => tracing::debug!("Feature {} of layer {} has no geometry", index, layer),
            }
            return None;
        };
        let zoom = fit.zoom_for(viewport);
        self.aggregator.set_zoom(&mut self.surface, zoom);
        self.current_feature = Some((layer.clone(), index));
        Some(LocatedFeature {
            layer,
            index,
            fit,
            zoom,
        })
    }

    fn scene(&self) -> SceneView {
        SceneView {
            mode: self.mode,
            zoom: self.aggregator.zoom(),
            tier: self.aggregator.tier(),
            layers: self.aggregator.layer_keys(),
            filter: self.filter.clone(),
            current: self.synchronizer.current().map(|t| t.id.clone()),
            stats: self.surface.stats(),
            entries: self.surface.snapshot(),
        }
    }

    fn teardown(&mut self) -> usize {
        self.current_feature = None;
        self.synchronizer.clear(&mut self.surface) + self.aggregator.clear(&mut self.surface)
    }
}

/// Cloneable sender side of a running [`MapView`].
#[derive(Debug, Clone)]
pub struct MapViewHandle {
    tx: mpsc::Sender<ViewCommand>,
    refresh: Arc<Notify>,
}

impl MapViewHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> ViewCommand) -> Result<T, ViewError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| ViewError::Stopped)?;
        rx.await.map_err(|_| ViewError::Stopped)
    }

    /// `Ok(None)` when the snapshot was dropped because the view is in dataset mode.
    pub async fn apply_snapshot(
        &self,
        observations: Vec<Observation>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Option<SyncReport>, ViewError> {
        self.request(|reply| ViewCommand::Snapshot {
            observations,
            fetched_at,
            reply,
        })
        .await
    }

    pub async fn set_zoom(&self, zoom: u8) -> Result<Vec<RebuildReport>, ViewError> {
        self.request(|reply| ViewCommand::SetZoom { zoom, reply }).await
    }

    pub async fn set_mode(&self, mode: ViewMode) -> Result<usize, ViewError> {
        self.request(|reply| ViewCommand::SetMode { mode, reply }).await
    }

    pub async fn show_layer(&self, layer: LayerKey, features: FeatureCollection) -> Result<RebuildReport, ViewError> {
        self.request(|reply| ViewCommand::ShowLayer {
            layer,
            features,
            reply,
        })
        .await
    }

    pub async fn hide_layer(&self, layer: LayerKey) -> Result<bool, ViewError> {
        self.request(|reply| ViewCommand::HideLayer { layer, reply }).await
    }

    /// Stores the filter used for layer fetches and returns the layers
    /// currently shown, which need re-fetching under it.
    pub async fn set_filter(&self, filter: Option<String>) -> Result<Vec<LayerKey>, ViewError> {
        self.request(|reply| ViewCommand::SetFilter { filter, reply }).await
    }

    pub async fn active_filter(&self) -> Result<Option<String>, ViewError> {
        self.request(|reply| ViewCommand::ActiveFilter { reply }).await
    }

    pub async fn click(&self, handle: LayerHandle) -> Result<Option<Thing>, ViewError> {
        self.request(|reply| ViewCommand::Click { handle, reply }).await
    }

    pub async fn current_thing(&self) -> Result<Option<Thing>, ViewError> {
        self.request(|reply| ViewCommand::CurrentThing { reply }).await
    }

    pub async fn thing(&self, id: ThingId) -> Result<Option<Thing>, ViewError> {
        self.request(|reply| ViewCommand::LookupThing { id, reply }).await
    }

    pub async fn current_feature(&self) -> Result<Option<SelectedFeature>, ViewError> {
        self.request(|reply| ViewCommand::CurrentFeature { reply }).await
    }

    pub async fn locate(
        &self,
        layer: LayerKey,
        index: usize,
        viewport: Viewport,
    ) -> Result<Option<LocatedFeature>, ViewError> {
        self.request(|reply| ViewCommand::Locate {
            layer,
            index,
            viewport,
            reply,
        })
        .await
    }

    pub async fn scene(&self) -> Result<SceneView, ViewError> {
        self.request(|reply| ViewCommand::Scene { reply }).await
    }

    /// Clears every marker and layer and ends the view task.
    pub async fn stop(&self) -> Result<usize, ViewError> {
        self.request(|reply| ViewCommand::Stop { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the view has switched back to sensor mode and wants a
    /// fresh snapshot without waiting for the next period.
    pub async fn refresh_requested(&self) {
        self.refresh.notified().await
    }
}
