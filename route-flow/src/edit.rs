use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::{FlowError, Result},
    gateway::{EditedAnalysis, FileId, RecommendationRequest},
    model::{CourseStep, Persona, PreferenceKind, TripMetadata},
    notice::NoticeBoard,
    runner::{PendingRecommendation, RecommendationRunner},
    store::{CommitOutcome, SessionId},
};

/// What the result screen hands to the edit screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditHandoff {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
}

/// Working copy of the current analysis, edited locally and sent back to the
/// gateway only on [`recompute`](Self::recompute).
///
/// Courses and personas are shared snapshots: every mutation writes through
/// [`Arc::make_mut`], so a snapshot taken earlier keeps its contents, and
/// [`revision`](Self::revision) moves forward.
pub struct EditSession {
    runner: RecommendationRunner,
    notices: NoticeBoard,
    handoff: EditHandoff,
    metadata: TripMetadata,
    courses: Arc<Vec<CourseStep>>,
    personas: Arc<Vec<Persona>>,
    revision: u64,
}

impl EditSession {
    /// Seed a working copy from the store. Fails with
    /// [`FlowError::MissingSession`] when the store has no analysis for the
    /// handed-over session; the host should send the user back to upload.
    pub fn open(
        runner: RecommendationRunner,
        notices: NoticeBoard,
        handoff: EditHandoff,
    ) -> Result<Self> {
        let store = runner.store();
        let analysis = if store.session_id() == handoff.session_id {
            store.get()
        } else {
            None
        };

        let Some(analysis) = analysis else {
            notices.warning(
                "Session expired",
                "The analysis data was reset. Please upload the file again.",
            );
            return Err(FlowError::MissingSession);
        };

        info!(session_id = %handoff.session_id, "Edit session opened");
        Ok(Self {
            runner,
            notices,
            handoff,
            metadata: analysis.metadata.clone(),
            courses: Arc::new(analysis.courses.clone()),
            personas: Arc::new(analysis.personas.clone()),
            revision: 0,
        })
    }

    pub fn handoff(&self) -> &EditHandoff {
        &self.handoff
    }

    pub fn metadata(&self) -> &TripMetadata {
        &self.metadata
    }

    pub fn courses(&self) -> Arc<Vec<CourseStep>> {
        self.courses.clone()
    }

    pub fn personas(&self) -> Arc<Vec<Persona>> {
        self.personas.clone()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the search keyword of one course step. Out-of-range indices
    /// are ignored.
    pub fn set_final_query(&mut self, step_index: usize, text: impl Into<String>) {
        if step_index >= self.courses.len() {
            debug!(step_index, "Ignoring keyword edit for unknown step");
            return;
        }
        Arc::make_mut(&mut self.courses)[step_index].final_query = text.into();
        self.revision += 1;
    }

    /// Append a trimmed tag to a persona's likes or dislikes.
    ///
    /// Returns the updated persona, or `None` when nothing was added: blank
    /// text (the user is notified) or an unknown persona.
    pub fn add_preference(
        &mut self,
        persona_index: usize,
        kind: PreferenceKind,
        text: &str,
    ) -> Option<&Persona> {
        let value = text.trim();
        if value.is_empty() {
            self.notices
                .warning("Empty preference", "Type something before adding it.");
            return None;
        }
        if persona_index >= self.personas.len() {
            debug!(persona_index, "Ignoring preference for unknown persona");
            return None;
        }

        let personas = Arc::make_mut(&mut self.personas);
        personas[persona_index]
            .preferences_mut(kind)
            .push(value.to_string());
        self.revision += 1;
        Some(&self.personas[persona_index])
    }

    /// Remove the tag at `item_index`, keeping the others in order. Returns
    /// the removed tag; invalid indices are ignored.
    pub fn remove_preference(
        &mut self,
        persona_index: usize,
        kind: PreferenceKind,
        item_index: usize,
    ) -> Option<String> {
        let len = self
            .personas
            .get(persona_index)
            .map(|p| p.preferences(kind).len())?;
        if item_index >= len {
            return None;
        }

        let personas = Arc::make_mut(&mut self.personas);
        let removed = personas[persona_index]
            .preferences_mut(kind)
            .remove(item_index);
        self.revision += 1;
        Some(removed)
    }

    /// The full working copy, as it would be sent.
    pub fn edited(&self) -> EditedAnalysis {
        EditedAnalysis {
            courses: self.courses.as_ref().clone(),
            personas: self.personas.as_ref().clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Claim the request slot and package the working copy.
    pub fn begin_recompute(&self) -> Result<PendingRecommendation> {
        if self.runner.store().session_id() != self.handoff.session_id {
            return Err(FlowError::MissingSession);
        }
        self.runner
            .begin(RecommendationRequest::FromEdits(self.edited()))
    }

    /// Fold the outcome of a recompute back in. On success the working copy
    /// is reseeded from the analysis the gateway returned; on failure it is
    /// kept as is and an error notice is raised.
    pub fn finish_recompute(&mut self, outcome: Result<CommitOutcome>) -> Result<CommitOutcome> {
        match outcome {
            Ok(CommitOutcome::Applied) => {
                if let Some(analysis) = self.runner.store().get() {
                    self.metadata = analysis.metadata.clone();
                    self.courses = Arc::new(analysis.courses.clone());
                    self.personas = Arc::new(analysis.personas.clone());
                    self.revision += 1;
                }
                info!(session_id = %self.handoff.session_id, "Recompute applied");
                Ok(CommitOutcome::Applied)
            }
            Ok(CommitOutcome::Discarded) => Ok(CommitOutcome::Discarded),
            Err(e) => {
                self.notices.error("Recompute failed", e.to_string());
                Err(e)
            }
        }
    }

    /// Send the working copy to the gateway and apply the answer.
    pub async fn recompute(&mut self) -> Result<CommitOutcome> {
        let pending = self.begin_recompute()?;
        let outcome = pending.send().await;
        self.finish_recompute(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::RecommendationGateway;
    use crate::model::{AnalysisSession, RecommendationResult, Route};
    use crate::store::SessionStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<RecommendationRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl RecommendationGateway for RecordingGateway {
        async fn create_recommendation(
            &self,
            request: RecommendationRequest,
        ) -> std::result::Result<RecommendationResult, GatewayError> {
            self.sent.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(GatewayError::Transport("connection refused".to_string()));
            }
            let RecommendationRequest::FromEdits(edits) = request else {
                return Err(GatewayError::Malformed("expected edits".to_string()));
            };
            Ok(RecommendationResult {
                analysis: AnalysisSession {
                    metadata: edits.metadata,
                    personas: edits.personas,
                    courses: edits
                        .courses
                        .into_iter()
                        .map(|mut c| {
                            c.final_query = format!("{} (refined)", c.final_query);
                            c
                        })
                        .collect(),
                },
                routes: vec![Route {
                    course_id: "new".to_string(),
                    label: "New".to_string(),
                    places: vec![],
                }],
            })
        }
    }

    fn analysis() -> AnalysisSession {
        AnalysisSession {
            metadata: TripMetadata {
                location: "Hongdae".to_string(),
                date: "2025-12-07".to_string(),
                group_name: "two friends".to_string(),
            },
            personas: vec![
                Persona {
                    name: "me".to_string(),
                    likes: vec!["sushi".to_string(), "quiet".to_string(), "wine".to_string()],
                    dislikes: vec!["crowds".to_string()],
                    traits: None,
                },
                Persona {
                    name: "friend".to_string(),
                    ..Default::default()
                },
            ],
            courses: vec![
                CourseStep {
                    step: 1,
                    category: "restaurant".to_string(),
                    final_query: "Hongdae quiet sushi".to_string(),
                },
                CourseStep {
                    step: 2,
                    category: "cafe".to_string(),
                    final_query: "Hongdae dessert cafe".to_string(),
                },
            ],
        }
    }

    fn setup(fail: bool) -> (EditSession, Arc<RecordingGateway>, NoticeBoard) {
        let store = SessionStore::new();
        store.set(Some(analysis()));
        let gateway = Arc::new(RecordingGateway {
            fail,
            ..Default::default()
        });
        let runner = RecommendationRunner::new(gateway.clone(), store.clone());
        let notices = NoticeBoard::new();
        let handoff = EditHandoff {
            session_id: store.session_id(),
            file_id: Some(FileId::new("f-1")),
        };
        let session = EditSession::open(runner, notices.clone(), handoff).unwrap();
        (session, gateway, notices)
    }

    #[test]
    fn test_open_without_analysis_is_missing_session() {
        let store = SessionStore::new();
        let runner = RecommendationRunner::new(Arc::new(RecordingGateway::default()), store.clone());
        let notices = NoticeBoard::new();
        let handoff = EditHandoff {
            session_id: store.session_id(),
            file_id: None,
        };

        let err = EditSession::open(runner, notices.clone(), handoff).err();
        assert_eq!(err, Some(FlowError::MissingSession));
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn test_open_with_stale_handoff_is_missing_session() {
        let store = SessionStore::new();
        store.set(Some(analysis()));
        let stale = store.session_id();
        store.reset();
        store.set(Some(analysis()));

        let runner = RecommendationRunner::new(Arc::new(RecordingGateway::default()), store);
        let handoff = EditHandoff {
            session_id: stale,
            file_id: None,
        };
        assert!(EditSession::open(runner, NoticeBoard::new(), handoff).is_err());
    }

    #[test]
    fn test_set_final_query_edits_in_place() {
        let (mut session, _, _) = setup(false);
        let before = session.courses();

        session.set_final_query(1, "Hongdae big cafe");
        session.set_final_query(7, "ignored");

        let after = session.courses();
        assert_eq!(after[1].final_query, "Hongdae big cafe");
        assert_eq!(after[1].step, 2);
        assert_eq!(after[0].final_query, "Hongdae quiet sushi");
        assert_eq!(before[1].final_query, "Hongdae dessert cafe");
        assert_eq!(session.revision(), 1);
    }

    #[test]
    fn test_add_preference_trims_and_appends() {
        let (mut session, _, _) = setup(false);

        let persona = session
            .add_preference(0, PreferenceKind::Like, "  ramen ")
            .cloned()
            .unwrap();
        assert_eq!(persona.likes.last().map(String::as_str), Some("ramen"));

        session.add_preference(1, PreferenceKind::Dislike, "smoke");
        assert_eq!(session.personas()[1].dislikes, vec!["smoke"]);
    }

    #[test]
    fn test_blank_preference_is_rejected() {
        let (mut session, _, notices) = setup(false);

        assert!(session.add_preference(0, PreferenceKind::Like, "   ").is_none());
        assert_eq!(session.personas()[0].likes.len(), 3);
        assert_eq!(session.revision(), 0);
        assert_eq!(notices.len(), 1);
    }

    #[test]
    fn test_duplicate_preference_is_kept() {
        let (mut session, _, _) = setup(false);
        session.add_preference(0, PreferenceKind::Like, "sushi");
        assert_eq!(
            session.personas()[0]
                .likes
                .iter()
                .filter(|l| *l == "sushi")
                .count(),
            2
        );
    }

    #[test]
    fn test_remove_preference_keeps_order() {
        let (mut session, _, _) = setup(false);

        let removed = session.remove_preference(0, PreferenceKind::Like, 1);
        assert_eq!(removed.as_deref(), Some("quiet"));
        assert_eq!(session.personas()[0].likes, vec!["sushi", "wine"]);

        assert!(session.remove_preference(0, PreferenceKind::Like, 5).is_none());
        assert!(session.remove_preference(9, PreferenceKind::Like, 0).is_none());
        assert_eq!(session.personas()[0].likes.len(), 2);
    }

    #[tokio::test]
    async fn test_recompute_without_edits_sends_original_data() {
        let (mut session, gateway, _) = setup(false);

        let outcome = session.recompute().await.unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);

        let sent = gateway.sent.lock().unwrap().clone();
        let original = analysis();
        assert_eq!(
            sent,
            vec![RecommendationRequest::FromEdits(EditedAnalysis {
                courses: original.courses,
                personas: original.personas,
                metadata: original.metadata,
            })]
        );
    }

    #[tokio::test]
    async fn test_recompute_reseeds_from_returned_analysis() {
        let (mut session, _, _) = setup(false);
        session.set_final_query(0, "Hongdae omakase");

        session.recompute().await.unwrap();

        assert_eq!(session.courses()[0].final_query, "Hongdae omakase (refined)");
        let store = session.runner.store();
        assert_eq!(
            store.get().unwrap().courses[0].final_query,
            "Hongdae omakase (refined)"
        );
        assert_eq!(store.get_result().unwrap().routes[0].course_id, "new");
    }

    #[tokio::test]
    async fn test_failed_recompute_keeps_edits_and_store() {
        let (mut session, _, notices) = setup(true);
        session.set_final_query(0, "Hongdae omakase");
        let result_before = session.runner.store().get_result();

        let err = session.recompute().await.unwrap_err();
        assert!(matches!(err, FlowError::Gateway(GatewayError::Transport(_))));

        assert_eq!(session.courses()[0].final_query, "Hongdae omakase");
        assert_eq!(
            session.runner.store().get().unwrap().courses[0].final_query,
            "Hongdae quiet sushi"
        );
        assert_eq!(session.runner.store().get_result(), result_before);
        assert_eq!(notices.drain()[0].title, "Recompute failed");
    }
}
