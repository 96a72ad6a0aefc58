use route_flow::{
    CourseStep, Notice, Persona, PlaceListItem, RouteTab, SceneSnapshot, SessionId, TripMetadata,
    ViewState,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub workspace_id: String,
    pub session_id: SessionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file_name: String,
    pub file_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateCourseRequest {
    pub final_query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddPreferenceRequest {
    pub value: String,
}

/// Everything a client needs to draw the result screen.
#[derive(Debug, Serialize, Deserialize)]
pub struct ViewResponse {
    pub workspace_id: String,
    pub session_id: SessionId,
    #[serde(flatten)]
    pub state: ViewState,
    pub loading: bool,
    pub tabs: Vec<RouteTab>,
    pub places: Vec<PlaceListItem>,
    pub scene: SceneSnapshot,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EditResponse {
    pub workspace_id: String,
    pub session_id: SessionId,
    pub revision: u64,
    pub loading: bool,
    pub metadata: TripMetadata,
    pub courses: Vec<CourseStep>,
    pub personas: Vec<Persona>,
    pub notices: Vec<Notice>,
}
