//! Map abstractions: geometry, the rendering-surface seam, and the overlay
//! engine that owns a surface.

pub mod overlay;
pub mod scene;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub use overlay::{EngineState, OverlayEngine, RenderSummary};
pub use scene::{SceneMarker, SceneSnapshot, SceneSurface, SurfaceStats, Viewport};

const TILE_SIZE: f64 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned bounding region in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    /// Smallest region covering every point, or `None` for an empty input.
    pub fn covering<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Bounds {
            south_west: first,
            north_east: first,
        };
        for p in points {
            bounds.south_west.lat = bounds.south_west.lat.min(p.lat);
            bounds.south_west.lng = bounds.south_west.lng.min(p.lng);
            bounds.north_east.lat = bounds.north_east.lat.max(p.lat);
            bounds.north_east.lng = bounds.north_east.lng.max(p.lng);
        }
        Some(bounds)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Largest web-mercator zoom at which the region fits inside a
    /// `width` x `height` pixel area after removing `inset`, capped at `max_zoom`.
    pub fn fit_zoom(&self, width: u32, height: u32, inset: Inset, max_zoom: u8) -> u8 {
        let usable_w = f64::from(width.saturating_sub(inset.left + inset.right).max(1));
        let usable_h = f64::from(height.saturating_sub(inset.top + inset.bottom).max(1));

        let lat_fraction =
            (mercator_lat(self.north_east.lat) - mercator_lat(self.south_west.lat)) / PI;
        let lng_fraction = (self.north_east.lng - self.south_west.lng) / 360.0;

        let zoom_for = |px: f64, fraction: f64| -> f64 {
            if fraction <= 0.0 {
                f64::from(max_zoom)
            } else {
                (px / TILE_SIZE / fraction).log2().floor()
            }
        };

        let zoom = zoom_for(usable_h, lat_fraction)
            .min(zoom_for(usable_w, lng_fraction))
            .clamp(0.0, f64::from(max_zoom));
        zoom as u8
    }
}

fn mercator_lat(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let rad_x2 = ((1.0 + sin) / (1.0 - sin)).ln() / 2.0;
    rad_x2.clamp(-PI, PI) / 2.0
}

/// Pixel margins kept clear when fitting bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inset {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Inset {
    pub const fn uniform(px: u32) -> Self {
        Self {
            top: px,
            right: px,
            bottom: px,
            left: px,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub position: LatLng,
    /// Content drawn inside the marker badge.
    pub label: String,
    pub title: String,
}

/// Capability set the overlay engine needs from a mapping provider.
///
/// Marker clicks are reported by the provider to its host as a [`MarkerId`];
/// the host forwards them to the result view, which resolves the id through
/// the engine's click table.
pub trait MapSurface {
    /// Build the base map. Called at most once per engine.
    fn create(&mut self, center: LatLng, zoom: u8);

    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId;

    fn remove_marker(&mut self, id: MarkerId);

    fn add_polyline(&mut self, path: Vec<LatLng>) -> PathId;

    fn remove_polyline(&mut self, id: PathId);

    /// Center and zoom so that `bounds` is visible inside the inset area,
    /// never zooming in past `max_zoom`.
    fn fit_bounds(&mut self, bounds: Bounds, inset: Inset, max_zoom: u8);

    /// Recenter, keeping the current zoom.
    fn pan_to(&mut self, center: LatLng);
}
