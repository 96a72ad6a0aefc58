use std::collections::HashMap;
use tracing::debug;

use super::{Bounds, LatLng, MapSurface, MarkerId, MarkerSpec, PathId};
use crate::config::MapConfig;
use crate::model::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
}

/// What a single [`OverlayEngine::render`] call drew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub markers: usize,
    pub path_vertices: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct PendingFit {
    generation: u64,
    bounds: Bounds,
}

/// Owns a map surface and the overlays drawn on it for one route at a time.
///
/// The base map is built once and then only mutated. Every `render` removes
/// the previous route's overlays before drawing the new ones; because it takes
/// `&mut self`, two renders can never interleave.
pub struct OverlayEngine<S: MapSurface> {
    surface: S,
    config: MapConfig,
    state: EngineState,
    markers: Vec<MarkerId>,
    path: Option<PathId>,
    click_table: HashMap<MarkerId, usize>,
    generation: u64,
    pending_fit: Option<PendingFit>,
}

impl<S: MapSurface> OverlayEngine<S> {
    pub fn new(surface: S, config: MapConfig) -> Self {
        Self {
            surface,
            config,
            state: EngineState::Uninitialized,
            markers: Vec::new(),
            path: None,
            click_table: HashMap::new(),
            generation: 0,
            pending_fit: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Build the base map if it does not exist yet. Later calls do nothing.
    pub fn attach(&mut self, center: LatLng) {
        if self.state == EngineState::Ready {
            return;
        }
        self.surface.create(center, self.config.default_zoom);
        self.state = EngineState::Ready;
        debug!(lat = center.lat, lng = center.lng, "Map surface created");
    }

    /// Remove every overlay and hand the surface back.
    pub fn detach(mut self) -> S {
        self.clear();
        self.surface
    }

    /// Replace whatever is drawn with `route`.
    ///
    /// The viewport fit is not applied here; it waits for the next
    /// [`tick`](Self::tick) so the surface can settle after a layout change.
    /// A fit still pending from an earlier render is dropped.
    pub fn render(&mut self, route: &Route) -> RenderSummary {
        self.generation += 1;
        self.clear();

        if route.places.is_empty() {
            self.attach(self.config.default_center);
            debug!(course_id = %route.course_id, "Route has no places, map left as is");
            return RenderSummary {
                markers: 0,
                path_vertices: None,
            };
        }

        let first = route.places[0].position();
        self.attach(first);

        for (index, place) in route.places.iter().enumerate() {
            let id = self.surface.add_marker(MarkerSpec {
                position: place.position(),
                label: (index + 1).to_string(),
                title: place.name.clone(),
            });
            self.markers.push(id);
            self.click_table.insert(id, index);
        }

        let path_vertices = if route.places.len() > 1 {
            let vertices: Vec<LatLng> = route.places.iter().map(|p| p.position()).collect();
            let count = vertices.len();
            self.path = Some(self.surface.add_polyline(vertices));
            Some(count)
        } else {
            None
        };

        self.pending_fit = Bounds::covering(route.places.iter().map(|p| p.position()))
            .map(|bounds| PendingFit {
                generation: self.generation,
                bounds,
            });

        debug!(
            course_id = %route.course_id,
            markers = self.markers.len(),
            path_vertices = ?path_vertices,
            generation = self.generation,
            "Route rendered"
        );

        RenderSummary {
            markers: self.markers.len(),
            path_vertices,
        }
    }

    /// Apply the viewport fit scheduled by the latest render, if any.
    /// Returns whether a fit was applied.
    pub fn tick(&mut self) -> bool {
        match self.pending_fit.take() {
            Some(fit) if fit.generation == self.generation => {
                self.surface
                    .fit_bounds(fit.bounds, self.config.fit_inset, self.config.max_fit_zoom);
                true
            }
            _ => false,
        }
    }

    pub fn has_pending_fit(&self) -> bool {
        self.pending_fit.is_some()
    }

    /// Recenter on `position`. Overlays and zoom are left alone, and a pending
    /// fit is cancelled so it cannot pull the map away again.
    pub fn pan_to(&mut self, position: LatLng) {
        if self.state == EngineState::Uninitialized {
            self.attach(position);
            return;
        }
        self.pending_fit = None;
        self.surface.pan_to(position);
    }

    /// Index of the place a clicked marker stands for.
    pub fn place_for_marker(&self, id: MarkerId) -> Option<usize> {
        self.click_table.get(&id).copied()
    }

    pub fn marker_ids(&self) -> &[MarkerId] {
        &self.markers
    }

    /// Remove all overlays. The base map and its viewport stay.
    pub fn clear(&mut self) {
        for id in self.markers.drain(..) {
            self.surface.remove_marker(id);
        }
        if let Some(path) = self.path.take() {
            self.surface.remove_polyline(path);
        }
        self.click_table.clear();
        self.pending_fit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::SceneSurface;
    use crate::model::Place;

    fn place(name: &str, lat: f64, lng: f64) -> Place {
        Place {
            name: name.to_string(),
            category: "food".to_string(),
            address: String::new(),
            lat,
            lng,
            link: None,
            search_keyword: None,
        }
    }

    fn route(id: &str, places: Vec<Place>) -> Route {
        Route {
            course_id: id.to_string(),
            label: id.to_uppercase(),
            places,
        }
    }

    fn engine() -> OverlayEngine<SceneSurface> {
        OverlayEngine::new(SceneSurface::default(), MapConfig::default())
    }

    fn three_stops() -> Route {
        route(
            "a",
            vec![
                place("one", 37.55, 126.92),
                place("two", 37.56, 126.93),
                place("three", 37.57, 126.95),
            ],
        )
    }

    #[test]
    fn test_render_draws_numbered_markers_and_path() {
        let mut engine = engine();
        let summary = engine.render(&three_stops());

        assert_eq!(summary.markers, 3);
        assert_eq!(summary.path_vertices, Some(3));
        assert_eq!(engine.state(), EngineState::Ready);

        let surface = engine.surface();
        let labels: Vec<&str> = surface.markers().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "3"]);
        assert_eq!(surface.path_count(), 1);

        let path: Vec<LatLng> = surface.paths().next().unwrap().to_vec();
        let expected: Vec<LatLng> = three_stops().places.iter().map(Place::position).collect();
        assert_eq!(path, expected);
    }

    #[test]
    fn test_single_place_has_no_path() {
        let mut engine = engine();
        let summary = engine.render(&route("solo", vec![place("only", 37.5, 127.0)]));

        assert_eq!(summary.markers, 1);
        assert_eq!(summary.path_vertices, None);
        assert_eq!(engine.surface().path_count(), 0);
    }

    #[test]
    fn test_rerender_replaces_previous_overlays() {
        let mut engine = engine();
        engine.render(&three_stops());
        engine.render(&route(
            "b",
            vec![place("x", 35.1, 129.0), place("y", 35.2, 129.1)],
        ));

        let surface = engine.surface();
        assert_eq!(surface.marker_count(), 2);
        assert_eq!(surface.path_count(), 1);
        assert_eq!(surface.stats().markers_removed, 3);
        assert_eq!(surface.stats().paths_removed, 1);
        assert_eq!(surface.stats().creates, 1);
    }

    #[test]
    fn test_empty_route_clears_and_keeps_center() {
        let mut engine = engine();
        engine.render(&three_stops());
        engine.tick();
        let before = engine.surface().viewport();

        let summary = engine.render(&route("empty", vec![]));
        assert_eq!(summary.markers, 0);
        assert!(!engine.tick());
        assert_eq!(engine.surface().marker_count(), 0);
        assert_eq!(engine.surface().path_count(), 0);
        assert_eq!(engine.surface().viewport(), before);
    }

    #[test]
    fn test_empty_first_route_opens_at_default_center() {
        let mut engine = engine();
        engine.render(&route("empty", vec![]));

        let viewport = engine.surface().viewport().unwrap();
        assert_eq!(viewport.center, MapConfig::default().default_center);
        assert_eq!(viewport.zoom, 14);
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_fit_is_deferred_until_tick() {
        let mut engine = engine();
        engine.render(&three_stops());
        assert_eq!(engine.surface().stats().fits, 0);
        assert!(engine.has_pending_fit());

        assert!(engine.tick());
        assert_eq!(engine.surface().stats().fits, 1);
        assert!(!engine.tick());
    }

    #[test]
    fn test_newer_render_supersedes_pending_fit() {
        let mut engine = engine();
        engine.render(&three_stops());
        let far = route("b", vec![place("x", 35.1, 129.0), place("y", 35.2, 129.1)]);
        engine.render(&far);

        assert!(engine.tick());
        assert_eq!(engine.surface().stats().fits, 1);
        let center = engine.surface().viewport().unwrap().center;
        assert!((center.lat - 35.15).abs() < 1e-9);
    }

    #[test]
    fn test_pan_keeps_overlays() {
        let mut engine = engine();
        engine.render(&three_stops());
        engine.tick();
        let zoom = engine.surface().viewport().unwrap().zoom;

        engine.pan_to(LatLng::new(37.56, 126.93));
        let viewport = engine.surface().viewport().unwrap();
        assert_eq!(viewport.center, LatLng::new(37.56, 126.93));
        assert_eq!(viewport.zoom, zoom);
        assert_eq!(engine.surface().marker_count(), 3);
    }

    #[test]
    fn test_marker_clicks_resolve_to_place_index() {
        let mut engine = engine();
        engine.render(&three_stops());

        let second = engine.marker_ids()[1];
        assert_eq!(engine.place_for_marker(second), Some(1));

        engine.render(&route("b", vec![place("x", 35.1, 129.0)]));
        assert_eq!(engine.place_for_marker(second), None);
    }

    #[test]
    fn test_detach_removes_everything() {
        let mut engine = engine();
        engine.render(&three_stops());
        let surface = engine.detach();
        assert_eq!(surface.marker_count(), 0);
        assert_eq!(surface.path_count(), 0);
    }
}
