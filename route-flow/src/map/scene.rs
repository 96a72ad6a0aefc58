//! In-memory map surface.
//!
//! Keeps the overlays and viewport a provider would draw, so a thin client can
//! replay them from a [`SceneSnapshot`]. Also records how many surface calls
//! were made, which is what the tests lean on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Bounds, Inset, LatLng, MapSurface, MarkerId, MarkerSpec, PathId};

pub const DEFAULT_WIDTH_PX: u32 = 800;
pub const DEFAULT_HEIGHT_PX: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMarker {
    pub id: MarkerId,
    pub position: LatLng,
    pub label: String,
    pub title: String,
}

/// Counts of surface calls since the surface was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceStats {
    pub creates: u32,
    pub markers_added: u32,
    pub markers_removed: u32,
    pub paths_added: u32,
    pub paths_removed: u32,
    pub fits: u32,
    pub pans: u32,
}

/// Serializable view of everything currently drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub viewport: Option<Viewport>,
    pub markers: Vec<SceneMarker>,
    pub paths: Vec<Vec<LatLng>>,
}

#[derive(Debug, Clone)]
pub struct SceneSurface {
    width: u32,
    height: u32,
    viewport: Option<Viewport>,
    markers: BTreeMap<MarkerId, SceneMarker>,
    paths: BTreeMap<PathId, Vec<LatLng>>,
    next_id: u64,
    stats: SurfaceStats,
}

impl SceneSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            viewport: None,
            markers: BTreeMap::new(),
            paths: BTreeMap::new(),
            next_id: 1,
            stats: SurfaceStats::default(),
        }
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Markers in creation order.
    pub fn markers(&self) -> impl Iterator<Item = &SceneMarker> {
        self.markers.values()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &[LatLng]> {
        self.paths.values().map(Vec::as_slice)
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn stats(&self) -> SurfaceStats {
        self.stats
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            viewport: self.viewport,
            markers: self.markers.values().cloned().collect(),
            paths: self.paths.values().cloned().collect(),
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for SceneSurface {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH_PX, DEFAULT_HEIGHT_PX)
    }
}

impl MapSurface for SceneSurface {
    fn create(&mut self, center: LatLng, zoom: u8) {
        self.stats.creates += 1;
        self.viewport = Some(Viewport { center, zoom });
    }

    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId {
        let id = MarkerId(self.next_id());
        self.stats.markers_added += 1;
        self.markers.insert(
            id,
            SceneMarker {
                id,
                position: marker.position,
                label: marker.label,
                title: marker.title,
            },
        );
        id
    }

    fn remove_marker(&mut self, id: MarkerId) {
        if self.markers.remove(&id).is_some() {
            self.stats.markers_removed += 1;
        }
    }

    fn add_polyline(&mut self, path: Vec<LatLng>) -> PathId {
        let id = PathId(self.next_id());
        self.stats.paths_added += 1;
        self.paths.insert(id, path);
        id
    }

    fn remove_polyline(&mut self, id: PathId) {
        if self.paths.remove(&id).is_some() {
            self.stats.paths_removed += 1;
        }
    }

    fn fit_bounds(&mut self, bounds: Bounds, inset: Inset, max_zoom: u8) {
        self.stats.fits += 1;
        self.viewport = Some(Viewport {
            center: bounds.center(),
            zoom: bounds.fit_zoom(self.width, self.height, inset, max_zoom),
        });
    }

    fn pan_to(&mut self, center: LatLng) {
        self.stats.pans += 1;
        if let Some(viewport) = self.viewport.as_mut() {
            viewport.center = center;
        }
    }
}
