// In-memory render surface - the scene served to the browser client
use crate::application::render_surface::{LayerHandle, RenderSurface, Shape};
use crate::domain::geometry::Coordinate;
use crate::domain::staleness::MarkerStyle;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct SceneEntry {
    pub handle: LayerHandle,
    pub popup_open: bool,
    #[serde(flatten)]
    pub shape: Shape,
}

/// Counters for every mutation, used to assert marker churn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SceneStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
pub struct InMemorySurface {
    next_handle: u64,
    entries: BTreeMap<LayerHandle, SceneEntry>,
    stats: SceneStats,
}

impl InMemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, handle: LayerHandle) -> Option<&SceneEntry> {
        self.entries.get(&handle)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SceneEntry> {
        self.entries.values()
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }

    /// Entries in handle order, ready to serialize.
    pub fn snapshot(&self) -> Vec<SceneEntry> {
        self.entries.values().cloned().collect()
    }
}

impl RenderSurface for InMemorySurface {
    fn add(&mut self, shape: Shape) -> LayerHandle {
        self.next_handle += 1;
        let handle = LayerHandle(self.next_handle);
        self.entries.insert(
            handle,
            SceneEntry {
                handle,
                popup_open: false,
                shape,
            },
        );
        self.stats.added += 1;
        handle
    }

    fn update_marker(&mut self, handle: LayerHandle, position: Coordinate, style: MarkerStyle) -> bool {
        match self.entries.get_mut(&handle).map(|e| &mut e.shape) {
            Some(Shape::Marker(marker)) => {
                marker.position = position;
                marker.style = style;
                self.stats.updated += 1;
                true
            }
            _ => false,
        }
    }

    fn is_popup_open(&self, handle: LayerHandle) -> bool {
        self.entries.get(&handle).is_some_and(|e| e.popup_open)
    }

    fn open_popup(&mut self, handle: LayerHandle) {
        // One popup at a time, as on a map
        for entry in self.entries.values_mut() {
            entry.popup_open = entry.handle == handle;
        }
    }

    fn set_popup_content(&mut self, handle: LayerHandle, content: String) {
        if let Some(Shape::Marker(marker)) = self.entries.get_mut(&handle).map(|e| &mut e.shape) {
            marker.popup = content;
        }
    }

    fn remove(&mut self, handle: LayerHandle) -> bool {
        let removed = self.entries.remove(&handle).is_some();
        if removed {
            self.stats.removed += 1;
        }
        removed
    }

    fn contains(&self, handle: LayerHandle) -> bool {
        self.entries.contains_key(&handle)
    }
}
