//! Result screen controller.
//!
//! Keeps the active route tab, the selected place, and the map viewport in
//! step with each other and with whatever result the [`SessionStore`] holds.
//!
//! [`SessionStore`]: crate::store::SessionStore

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    edit::EditHandoff,
    error::{FlowError, Result},
    gateway::{FileId, RecommendationRequest},
    map::{MapSurface, MarkerId, OverlayEngine},
    model::{RecommendationResult, Route},
    notice::NoticeBoard,
    runner::{PendingRecommendation, RecommendationRunner},
    store::CommitOutcome,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewState {
    Loading,
    Ready {
        active_route_id: String,
        selected_place: Option<usize>,
    },
    /// The first recommendation failed. Only a new upload gets out of here.
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTab {
    pub course_id: String,
    pub label: String,
    pub place_count: usize,
    pub active: bool,
}

/// One row of the place list next to the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceListItem {
    pub index: usize,
    /// Same number as the marker badge.
    pub number: usize,
    pub name: String,
    pub category: String,
    pub address: String,
    pub link: Option<String>,
    pub selected: bool,
}

pub struct ResultView<S: MapSurface> {
    runner: RecommendationRunner,
    notices: NoticeBoard,
    engine: OverlayEngine<S>,
    results: watch::Receiver<Option<Arc<RecommendationResult>>>,
    current: Option<Arc<RecommendationResult>>,
    state: ViewState,
    file_id: Option<FileId>,
}

impl<S: MapSurface> ResultView<S> {
    pub fn new(runner: RecommendationRunner, notices: NoticeBoard, engine: OverlayEngine<S>) -> Self {
        let results = runner.store().subscribe();
        Self {
            runner,
            notices,
            engine,
            results,
            current: None,
            state: ViewState::Loading,
            file_id: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn engine(&self) -> &OverlayEngine<S> {
        &self.engine
    }

    pub fn surface(&self) -> &S {
        self.engine.surface()
    }

    pub fn result(&self) -> Option<&Arc<RecommendationResult>> {
        self.current.as_ref()
    }

    /// Whether a spinner belongs on screen: either the first result has not
    /// arrived, or a recompute for this session is pending.
    pub fn is_loading(&self) -> bool {
        self.state == ViewState::Loading || self.runner.store().is_request_in_flight()
    }

    /// Enter the result screen.
    ///
    /// Shows the stored result when there is one. Otherwise claims a request
    /// for `file_id` and returns it for the caller to send and hand to
    /// [`finish_loading`](Self::finish_loading). Without either, the session
    /// is gone and the caller should redirect to upload.
    pub fn enter(&mut self, file_id: Option<FileId>) -> Result<Option<PendingRecommendation>> {
        if file_id.is_some() {
            self.file_id = file_id.clone();
        }

        let stored = self.results.borrow_and_update().clone();
        if let Some(result) = stored {
            self.show(result);
            return Ok(None);
        }

        // Nothing stored means a new session: whatever is on screen is stale.
        self.current = None;
        self.state = ViewState::Loading;
        self.engine.clear();

        let Some(file_id) = file_id else {
            self.notices.warning(
                "Session expired",
                "The analysis data was reset. Please upload the file again.",
            );
            return Err(FlowError::MissingSession);
        };

        let pending = self.runner.begin(RecommendationRequest::FromFile(file_id))?;
        Ok(Some(pending))
    }

    /// Apply the outcome of the request returned by [`enter`](Self::enter).
    pub fn finish_loading(&mut self, outcome: Result<CommitOutcome>) -> Result<()> {
        match outcome {
            Ok(CommitOutcome::Applied) => {
                self.sync();
                Ok(())
            }
            Ok(CommitOutcome::Discarded) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                if self.state == ViewState::Loading {
                    self.state = ViewState::Failed {
                        message: message.clone(),
                    };
                }
                self.notices.error("Analysis failed", message);
                Err(e)
            }
        }
    }

    /// Enter and, if needed, fetch the first recommendation in one go.
    pub async fn load(&mut self, file_id: FileId) -> Result<()> {
        match self.enter(Some(file_id))? {
            Some(pending) => {
                let outcome = pending.send().await;
                self.finish_loading(outcome)
            }
            None => Ok(()),
        }
    }

    /// Pick up a result written to the store since the last look, e.g. by a
    /// recompute. A new result is shown from its first route. Returns whether
    /// anything changed.
    pub fn sync(&mut self) -> bool {
        if !self.results.has_changed().unwrap_or(false) {
            return false;
        }
        let latest = self.results.borrow_and_update().clone();
        match latest {
            Some(result) => self.show(result),
            None => {
                debug!("Result cleared from store");
                self.current = None;
                self.state = ViewState::Loading;
                self.engine.clear();
            }
        }
        true
    }

    /// Make `course_id` the active tab: selection is cleared and the map is
    /// rebuilt for that route.
    pub fn select_route_tab(&mut self, course_id: &str) -> Result<()> {
        let result = self.ready_result()?;
        let route = result
            .route(course_id)
            .ok_or_else(|| FlowError::UnknownRoute(course_id.to_string()))?;

        self.state = ViewState::Ready {
            active_route_id: route.course_id.clone(),
            selected_place: None,
        };
        self.engine.render(route);
        Ok(())
    }

    /// Highlight place `index` of the active route and pan to it. The same
    /// path serves list clicks and marker clicks.
    pub fn select_place(&mut self, index: usize) -> Result<()> {
        let position = {
            let route = self.active_route().ok_or(FlowError::NotReady)?;
            let place = route.places.get(index).ok_or(FlowError::PlaceOutOfRange {
                index,
                len: route.places.len(),
            })?;
            place.position()
        };

        if let ViewState::Ready { selected_place, .. } = &mut self.state {
            *selected_place = Some(index);
        }
        self.engine.pan_to(position);
        Ok(())
    }

    pub fn on_marker_click(&mut self, marker: MarkerId) -> Result<()> {
        let index = self
            .engine
            .place_for_marker(marker)
            .ok_or(FlowError::UnknownMarker(marker.0))?;
        self.select_place(index)
    }

    /// Let deferred viewport work run. Hosts call this once per frame or
    /// after each batch of events.
    pub fn tick(&mut self) -> bool {
        self.engine.tick()
    }

    /// Reference for the edit screen.
    pub fn request_edit(&self) -> Result<EditHandoff> {
        if !matches!(self.state, ViewState::Ready { .. }) {
            return Err(FlowError::NotReady);
        }
        Ok(EditHandoff {
            session_id: self.runner.store().session_id(),
            file_id: self.file_id.clone(),
        })
    }

    pub fn active_route(&self) -> Option<&Route> {
        let ViewState::Ready {
            active_route_id, ..
        } = &self.state
        else {
            return None;
        };
        self.current.as_ref()?.route(active_route_id)
    }

    pub fn selected_place(&self) -> Option<usize> {
        match &self.state {
            ViewState::Ready { selected_place, .. } => *selected_place,
            _ => None,
        }
    }

    pub fn tabs(&self) -> Vec<RouteTab> {
        let active = self.active_route().map(|r| r.course_id.as_str());
        self.current
            .iter()
            .flat_map(|result| result.routes.iter())
            .map(|route| RouteTab {
                course_id: route.course_id.clone(),
                label: route.label.clone(),
                place_count: route.places.len(),
                active: Some(route.course_id.as_str()) == active,
            })
            .collect()
    }

    pub fn list_items(&self) -> Vec<PlaceListItem> {
        let selected = self.selected_place();
        self.active_route()
            .map(|route| {
                route
                    .places
                    .iter()
                    .enumerate()
                    .map(|(index, place)| PlaceListItem {
                        index,
                        number: index + 1,
                        name: place.name.clone(),
                        category: place.category.clone(),
                        address: place.address.clone(),
                        link: place.link.clone(),
                        selected: selected == Some(index),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ready_result(&self) -> Result<Arc<RecommendationResult>> {
        match (&self.state, &self.current) {
            (ViewState::Ready { .. }, Some(result)) => Ok(result.clone()),
            _ => Err(FlowError::NotReady),
        }
    }

    fn show(&mut self, result: Arc<RecommendationResult>) {
        let Some(first) = result.routes.first() else {
            self.state = ViewState::Failed {
                message: "recommendation contained no routes".to_string(),
            };
            self.engine.clear();
            self.current = Some(result);
            return;
        };

        info!(
            routes = result.routes.len(),
            course_id = %first.course_id,
            "Showing recommendation"
        );
        self.state = ViewState::Ready {
            active_route_id: first.course_id.clone(),
            selected_place: None,
        };
        self.engine.render(first);
        self.current = Some(result);
    }
}
