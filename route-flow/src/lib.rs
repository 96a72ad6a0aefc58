pub mod config;
pub mod edit;
pub mod error;
pub mod gateway;
pub mod map;
pub mod model;
pub mod notice;
pub mod runner;
pub mod store;
pub mod upload;
pub mod view;

// Re-export commonly used types
pub use config::MapConfig;
pub use edit::{EditHandoff, EditSession};
pub use error::{FlowError, GatewayError, Result};
#[cfg(feature = "http")]
pub use gateway::HttpRecommendationGateway;
pub use gateway::{EditedAnalysis, FileId, RecommendationGateway, RecommendationRequest};
pub use map::{LatLng, MapSurface, MarkerId, OverlayEngine, SceneSnapshot, SceneSurface};
pub use model::{
    AnalysisSession, CourseStep, Persona, Place, PreferenceKind, RecommendationResult, Route,
    TripMetadata,
};
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use runner::{PendingRecommendation, RecommendationRunner};
pub use store::{CommitOutcome, SessionId, SessionStore};
pub use upload::{FileIngestion, MediaKind, SelectedFile, UploadScreen, UploadTicket};
pub use view::{PlaceListItem, ResultView, RouteTab, ViewState};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoGateway;

    #[async_trait]
    impl RecommendationGateway for EchoGateway {
        async fn create_recommendation(
            &self,
            request: RecommendationRequest,
        ) -> std::result::Result<RecommendationResult, GatewayError> {
            let label = match &request {
                RecommendationRequest::FromFile(id) => format!("from {id}"),
                RecommendationRequest::FromEdits(_) => "edited".to_string(),
            };
            RecommendationResult::from_value(serde_json::json!({
                "analysis": {
                    "metadata": { "location": "Seongsu", "date": "2025-12-07", "group_name": "us" },
                    "personas": [{ "name": "me", "likes": ["coffee"], "dislikes": [] }],
                    "courses": [{ "step": 1, "category": "cafe", "final_query": "Seongsu cafe" }]
                },
                "routes": [{
                    "course_id": "c1",
                    "label": label,
                    "places": [
                        { "name": "Cafe", "category": "cafe", "address": "1 Seongsu-ro", "lat": 37.544, "lng": 127.055 },
                        { "name": "Park", "category": "park", "address": "Seoul Forest", "lat": 37.544, "lng": 127.037 }
                    ]
                }]
            }))
        }
    }

    #[tokio::test]
    async fn test_result_then_edit_round() {
        let store = SessionStore::new();
        let notices = NoticeBoard::new();
        let runner = RecommendationRunner::new(Arc::new(EchoGateway), store.clone());
        let engine = OverlayEngine::new(SceneSurface::default(), MapConfig::default());
        let mut view = ResultView::new(runner.clone(), notices.clone(), engine);

        view.load(FileId::new("f-9")).await.unwrap();
        assert_eq!(view.tabs()[0].label, "from f-9");
        assert_eq!(view.surface().marker_count(), 2);

        let handoff = view.request_edit().unwrap();
        let mut edit = EditSession::open(runner, notices, handoff).unwrap();
        edit.add_preference(0, PreferenceKind::Like, "bakery");
        edit.recompute().await.unwrap();

        assert!(view.sync());
        assert_eq!(view.tabs()[0].label, "edited");
        assert_eq!(view.surface().stats().creates, 1);
    }
}
