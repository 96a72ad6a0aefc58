use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
};
use dashmap::DashMap;
use route_flow::{
    FileId, FlowError, GatewayError, HttpRecommendationGateway, MapConfig, MarkerId,
    PreferenceKind, RecommendationGateway,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    models::{
        AddPreferenceRequest, CreateSessionResponse, EditResponse, UpdateCourseRequest,
        UploadRequest, ViewResponse,
    },
    workspace::{ReportedUpload, Workspace},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn conflict_error(message: &str) -> ApiError {
    (StatusCode::CONFLICT, Json(json!({ "error": message })))
}

fn bad_gateway_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn flow_error(e: FlowError) -> ApiError {
    match &e {
        FlowError::Gateway(GatewayError::UnknownFile(id)) => not_found_error("File not found", id),
        FlowError::Gateway(inner) => bad_gateway_error("Recommendation failed", &inner.to_string()),
        FlowError::UnknownRoute(id) => not_found_error("Route not found", id),
        FlowError::UnknownMarker(id) => not_found_error("Marker not found", &id.to_string()),
        FlowError::MissingSession | FlowError::RequestInFlight | FlowError::NotReady => {
            conflict_error(&e.to_string())
        }
        FlowError::PlaceOutOfRange { .. }
        | FlowError::UnsupportedFile(_)
        | FlowError::NoFileSelected
        | FlowError::EmptyPreference => bad_request_error(&e.to_string()),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn RecommendationGateway>,
    pub map: MapConfig,
    pub workspaces: Arc<DashMap<String, Arc<Mutex<Workspace>>>>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn RecommendationGateway>, map: MapConfig) -> Self {
        Self {
            gateway,
            map,
            workspaces: Arc::new(DashMap::new()),
        }
    }

    fn workspace(&self, id: &str) -> Result<Arc<Mutex<Workspace>>, ApiError> {
        self.workspaces
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| not_found_error("Session not found", id))
    }
}

pub fn create_app(config: &ServiceConfig) -> Router {
    let mut gateway = HttpRecommendationGateway::new(&config.api_url);
    if let Some(token) = &config.api_token {
        gateway = gateway.with_token(token.clone());
    }
    info!(endpoint = %gateway.endpoint(), "Using recommendation API");

    build_router(AppState::new(Arc::new(gateway), config.map.clone()))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}/upload", post(upload_file))
        .route("/sessions/{id}/view", get(get_view))
        .route("/sessions/{id}/tabs/{course_id}", post(select_route_tab))
        .route("/sessions/{id}/places/{index}", post(select_place))
        .route("/sessions/{id}/markers/{marker_id}/click", post(click_marker))
        .route("/sessions/{id}/edit", get(get_edit))
        .route("/sessions/{id}/edit/courses/{index}", put(update_course))
        .route("/sessions/{id}/edit/personas/{persona}/{kind}", post(add_preference))
        .route(
            "/sessions/{id}/edit/personas/{persona}/{kind}/{item}",
            delete(remove_preference),
        )
        .route("/sessions/{id}/edit/recompute", post(recompute))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Route Planner Service",
        "version": "0.1.0",
        "description": "Multi-route trip recommendations with an editable analysis",
        "endpoints": {
            "POST /sessions": "Open a new planning session",
            "POST /sessions/{id}/upload": "Register an uploaded file and fetch its routes",
            "GET /sessions/{id}/view": "Current tabs, place list and map scene",
            "POST /sessions/{id}/tabs/{course_id}": "Switch the active route",
            "POST /sessions/{id}/places/{index}": "Select a place of the active route",
            "POST /sessions/{id}/markers/{marker_id}/click": "Select the place behind a marker",
            "GET /sessions/{id}/edit": "Editable analysis",
            "PUT /sessions/{id}/edit/courses/{index}": "Change a course keyword",
            "POST /sessions/{id}/edit/personas/{persona}/{kind}": "Add a like or dislike",
            "DELETE /sessions/{id}/edit/personas/{persona}/{kind}/{item}": "Remove a like or dislike",
            "POST /sessions/{id}/edit/recompute": "Recompute routes from the edits",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_session(State(state): State<AppState>) -> ApiResult<CreateSessionResponse> {
    let workspace_id = Uuid::new_v4().to_string();
    let mut workspace = Workspace::new(state.gateway.clone(), state.map.clone());
    let session_id = workspace.upload.enter();

    state
        .workspaces
        .insert(workspace_id.clone(), Arc::new(Mutex::new(workspace)));
    info!(workspace_id = %workspace_id, session_id = %session_id, "Workspace created");

    Ok(Json(CreateSessionResponse {
        workspace_id,
        session_id,
    }))
}

async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<ViewResponse> {
    info!(workspace_id = %id, file_name = %request.file_name, "Upload received");
    let workspace = state.workspace(&id)?;

    let pending = {
        let mut ws = workspace.lock().await;
        ws.upload.enter();
        ws.edit = None;
        ws.upload
            .select_file(&request.file_name)
            .map_err(flow_error)?;
        let ticket = ws
            .upload
            .submit(&ReportedUpload(FileId::new(request.file_id)))
            .await
            .map_err(flow_error)?;
        if ticket.kind.is_slow() {
            info!(workspace_id = %id, "Video upload, analysis will take longer");
        }
        ws.view.enter(Some(ticket.file_id)).map_err(flow_error)?
    };

    // The gateway call runs without the workspace lock.
    let outcome = match pending {
        Some(pending) => Some(pending.send().await),
        None => None,
    };

    let mut ws = workspace.lock().await;
    if let Some(outcome) = outcome {
        ws.view.finish_loading(outcome).map_err(|e| {
            error!(workspace_id = %id, "First recommendation failed: {}", e);
            flow_error(e)
        })?;
    }
    Ok(Json(view_response(&id, &mut ws)))
}

async fn get_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ViewResponse> {
    let workspace = state.workspace(&id)?;
    let mut ws = workspace.lock().await;
    Ok(Json(view_response(&id, &mut ws)))
}

async fn select_route_tab(
    State(state): State<AppState>,
    Path((id, course_id)): Path<(String, String)>,
) -> ApiResult<ViewResponse> {
    let workspace = state.workspace(&id)?;
    let mut ws = workspace.lock().await;
    ws.view.sync();
    ws.view.select_route_tab(&course_id).map_err(flow_error)?;
    Ok(Json(view_response(&id, &mut ws)))
}

async fn select_place(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<ViewResponse> {
    let workspace = state.workspace(&id)?;
    let mut ws = workspace.lock().await;
    ws.view.sync();
    ws.view.select_place(index).map_err(flow_error)?;
    Ok(Json(view_response(&id, &mut ws)))
}

async fn click_marker(
    State(state): State<AppState>,
    Path((id, marker_id)): Path<(String, u64)>,
) -> ApiResult<ViewResponse> {
    let workspace = state.workspace(&id)?;
    let mut ws = workspace.lock().await;
    ws.view.sync();
    ws.view
        .on_marker_click(MarkerId(marker_id))
        .map_err(flow_error)?;
    Ok(Json(view_response(&id, &mut ws)))
}

async fn get_edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EditResponse> {
    let workspace = state.workspace(&id)?;
    let mut ws = workspace.lock().await;
    ws.refresh();
    Ok(Json(edit_response(&id, &mut ws)?))
}

async fn update_course(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    Json(request): Json<UpdateCourseRequest>,
) -> ApiResult<EditResponse> {
    let workspace = state.workspace(&id)?;
    let mut ws = workspace.lock().await;
    ws.refresh();

    let edit = ws.edit_session().map_err(flow_error)?;
    if index >= edit.courses().len() {
        return Err(not_found_error("Course step not found", &index.to_string()));
    }
    edit.set_final_query(index, request.final_query);

    Ok(Json(edit_response(&id, &mut ws)?))
}

async fn add_preference(
    State(state): State<AppState>,
    Path((id, persona, kind)): Path<(String, usize, String)>,
    Json(request): Json<AddPreferenceRequest>,
) -> ApiResult<EditResponse> {
    let kind = parse_kind(&kind)?;
    let workspace = state.workspace(&id)?;
    let mut ws = workspace.lock().await;
    ws.refresh();

    let edit = ws.edit_session().map_err(flow_error)?;
    if edit.add_preference(persona, kind, &request.value).is_none() {
        return Err(if request.value.trim().is_empty() {
            flow_error(FlowError::EmptyPreference)
        } else {
            not_found_error("Persona not found", &persona.to_string())
        });
    }

    Ok(Json(edit_response(&id, &mut ws)?))
}

async fn remove_preference(
    State(state): State<AppState>,
    Path((id, persona, kind, item)): Path<(String, usize, String, usize)>,
) -> ApiResult<EditResponse> {
    let kind = parse_kind(&kind)?;
    let workspace = state.workspace(&id)?;
    let mut ws = workspace.lock().await;
    ws.refresh();

    let edit = ws.edit_session().map_err(flow_error)?;
    if edit.remove_preference(persona, kind, item).is_none() {
        return Err(not_found_error(
            "Preference not found",
            &format!("{persona}/{item}"),
        ));
    }

    Ok(Json(edit_response(&id, &mut ws)?))
}

async fn recompute(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EditResponse> {
    info!(workspace_id = %id, "Recompute requested");
    let workspace = state.workspace(&id)?;

    let pending = {
        let mut ws = workspace.lock().await;
        ws.refresh();
        ws.edit_session()
            .map_err(flow_error)?
            .begin_recompute()
            .map_err(flow_error)?
    };

    // The gateway call runs without the workspace lock.
    let outcome = pending.send().await;

    let mut ws = workspace.lock().await;
    let Some(edit) = ws.edit.as_mut() else {
        warn!(workspace_id = %id, "Edit draft disappeared during recompute");
        return Err(flow_error(FlowError::MissingSession));
    };
    edit.finish_recompute(outcome).map_err(flow_error)?;
    ws.refresh();

    Ok(Json(edit_response(&id, &mut ws)?))
}

fn parse_kind(raw: &str) -> Result<PreferenceKind, ApiError> {
    raw.parse::<PreferenceKind>()
        .map_err(|e| bad_request_error(&e))
}

fn view_response(id: &str, ws: &mut Workspace) -> ViewResponse {
    ws.refresh();
    ViewResponse {
        workspace_id: id.to_string(),
        session_id: ws.store.session_id(),
        state: ws.view.state().clone(),
        loading: ws.view.is_loading(),
        tabs: ws.view.tabs(),
        places: ws.view.list_items(),
        scene: ws.view.surface().snapshot(),
        notices: ws.notices.drain(),
    }
}

fn edit_response(id: &str, ws: &mut Workspace) -> Result<EditResponse, ApiError> {
    let session_id = ws.store.session_id();
    let loading = ws.store.is_request_in_flight();
    let edit = ws.edit_session().map_err(flow_error)?;

    let mut response = EditResponse {
        workspace_id: id.to_string(),
        session_id,
        revision: edit.revision(),
        loading,
        metadata: edit.metadata().clone(),
        courses: edit.courses().as_ref().clone(),
        personas: edit.personas().as_ref().clone(),
        notices: Vec::new(),
    };
    response.notices = ws.notices.drain();
    Ok(response)
}
