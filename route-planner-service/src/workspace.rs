use async_trait::async_trait;
use route_flow::{
    EditSession, FileId, FileIngestion, FlowError, GatewayError, MapConfig, NoticeBoard,
    OverlayEngine, RecommendationGateway, RecommendationRunner, ResultView, SceneSurface,
    SelectedFile, SessionStore, UploadScreen,
};
use std::sync::Arc;

/// Everything one client session needs: the three screens over a shared
/// store, and the scene the client replays.
pub struct Workspace {
    pub store: SessionStore,
    pub notices: NoticeBoard,
    pub runner: RecommendationRunner,
    pub upload: UploadScreen,
    pub view: ResultView<SceneSurface>,
    pub edit: Option<EditSession>,
}

impl Workspace {
    pub fn new(gateway: Arc<dyn RecommendationGateway>, map: MapConfig) -> Self {
        let store = SessionStore::new();
        let notices = NoticeBoard::new();
        let runner = RecommendationRunner::new(gateway, store.clone());
        let engine = OverlayEngine::new(SceneSurface::default(), map);

        Self {
            upload: UploadScreen::new(store.clone(), notices.clone()),
            view: ResultView::new(runner.clone(), notices.clone(), engine),
            edit: None,
            store,
            notices,
            runner,
        }
    }

    /// The edit draft for the current session, opened on first use. A draft
    /// left over from an earlier session is replaced.
    pub fn edit_session(&mut self) -> Result<&mut EditSession, FlowError> {
        let current = self.store.session_id();
        let stale = self
            .edit
            .as_ref()
            .is_none_or(|edit| edit.handoff().session_id != current);

        if stale {
            let handoff = self.view.request_edit()?;
            let session = EditSession::open(self.runner.clone(), self.notices.clone(), handoff)?;
            self.edit = Some(session);
        }

        self.edit.as_mut().ok_or(FlowError::MissingSession)
    }

    /// Let the result view catch up with the store and settle its viewport.
    pub fn refresh(&mut self) {
        self.view.sync();
        self.view.tick();
    }
}

/// The client uploads the file to the backend itself and reports the id it
/// got back, so ingestion here only passes that id along.
pub struct ReportedUpload(pub FileId);

#[async_trait]
impl FileIngestion for ReportedUpload {
    async fn ingest(&self, _file: &SelectedFile) -> Result<FileId, GatewayError> {
        if self.0.as_str().trim().is_empty() {
            return Err(GatewayError::UnknownFile(String::new()));
        }
        Ok(self.0.clone())
    }
}
