// Marker synchronizer - keeps one marker per live Thing
use crate::application::render_surface::{LayerHandle, MarkerShape, RenderSurface, Shape};
use crate::domain::observation::ThingId;
use crate::domain::staleness::MarkerStyle;
use crate::domain::thing::Thing;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug)]
struct MarkerEntry {
    handle: LayerHandle,
    thing: Thing,
}

/// Owns the id → marker mapping for one map view.
///
/// After every [`MarkerSynchronizer::sync`] the set of registered ids equals
/// the ids of the Things passed in, and a Thing that persists across cycles
/// keeps the same handle.
#[derive(Debug, Default)]
pub struct MarkerSynchronizer {
    markers: HashMap<ThingId, MarkerEntry>,
    by_handle: HashMap<LayerHandle, ThingId>,
    current: Option<ThingId>,
}

impl MarkerSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync<S>(&mut self, surface: &mut S, things: Vec<Thing>, now: DateTime<Utc>) -> SyncReport
    where
        S: RenderSurface + ?Sized,
    {
        let mut report = SyncReport::default();
        let live: HashSet<ThingId> = things.iter().map(|t| t.id.clone()).collect();

        for thing in things {
            let style = MarkerStyle::for_reading(thing.primary_value, thing.online);

            let updated = match self.markers.get_mut(&thing.id) {
                Some(entry) if surface.update_marker(entry.handle, thing.coordinate, style.clone()) => {
                    if surface.is_popup_open(entry.handle) {
                        surface.set_popup_content(entry.handle, thing.popup_content(now));
                    }
                    entry.thing = thing.clone();
                    true
                }
                Some(entry) => {
                    tracing::warn!("Marker {} for {} vanished from the map, re-adding", entry.handle, thing.id);
                    self.by_handle.remove(&entry.handle);
                    false
                }
                None => false,
            };

            if updated {
                report.updated += 1;
                continue;
            }

            let handle = surface.add(Shape::Marker(MarkerShape {
                position: thing.coordinate,
                style,
                popup: thing.popup_content(now),
            }));
            self.by_handle.insert(handle, thing.id.clone());
            self.markers.insert(thing.id.clone(), MarkerEntry { handle, thing });
            report.created += 1;
        }

        let stale: Vec<ThingId> = self
            .markers
            .keys()
            .filter(|id| !live.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(entry) = self.markers.remove(&id) {
                surface.remove(entry.handle);
                self.by_handle.remove(&entry.handle);
                report.removed += 1;
            }
            if self.current.as_ref() == Some(&id) {
                self.current = None;
            }
        }

        tracing::debug!(
            "Marker sync: {} created, {} updated, {} removed",
            report.created,
            report.updated,
            report.removed
        );
        report
    }

    /// Click on a marker: it becomes the current selection and opens its popup.
    pub fn click<S>(&mut self, surface: &mut S, handle: LayerHandle) -> Option<&Thing>
    where
        S: RenderSurface + ?Sized,
    {
        let id = self.by_handle.get(&handle)?.clone();
        surface.open_popup(handle);
        self.current = Some(id);
        self.current()
    }

    /// The selected Thing as of the latest cycle.
    pub fn current(&self) -> Option<&Thing> {
        self.current
            .as_ref()
            .and_then(|id| self.markers.get(id))
            .map(|entry| &entry.thing)
    }

    pub fn handle_of(&self, id: &ThingId) -> Option<LayerHandle> {
        self.markers.get(id).map(|entry| entry.handle)
    }

    pub fn get(&self, id: &ThingId) -> Option<&Thing> {
        self.markers.get(id).map(|entry| &entry.thing)
    }

    pub fn ids(&self) -> HashSet<ThingId> {
        self.markers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Removes every marker from the surface.
    pub fn clear<S>(&mut self, surface: &mut S) -> usize
    where
        S: RenderSurface + ?Sized,
    {
        let count = self.markers.len();
        for (_, entry) in self.markers.drain() {
            surface.remove(entry.handle);
        }
        self.by_handle.clear();
        self.current = None;
        count
    }
}
