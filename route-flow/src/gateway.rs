use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    error::GatewayError,
    model::{CourseStep, Persona, RecommendationResult, TripMetadata},
};

/// Identifier returned by file ingestion for an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user-edited triple sent back for a recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditedAnalysis {
    pub courses: Vec<CourseStep>,
    pub personas: Vec<Persona>,
    pub metadata: TripMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendationRequest {
    /// First recommendation for a freshly uploaded file.
    FromFile(FileId),
    /// Recompute from an edited analysis.
    FromEdits(EditedAnalysis),
}

impl RecommendationRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FromFile(_) => "file",
            Self::FromEdits(_) => "edits",
        }
    }
}

/// Boundary to whatever turns files or edits into routes.
#[async_trait]
pub trait RecommendationGateway: Send + Sync {
    async fn create_recommendation(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationResult, GatewayError>;
}

#[cfg(feature = "http")]
pub use http::HttpRecommendationGateway;

#[cfg(feature = "http")]
mod http {
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use tracing::{debug, error};

    use super::{RecommendationGateway, RecommendationRequest};
    use crate::{error::GatewayError, model::RecommendationResult};

    const RECOMMENDATIONS_PATH: &str = "/api/v1/recommendations/";

    /// Gateway backed by the recommendation HTTP API.
    ///
    /// First-time requests pass the file id as a query parameter; recomputes
    /// post the edited analysis as JSON.
    #[derive(Clone)]
    pub struct HttpRecommendationGateway {
        client: reqwest::Client,
        endpoint: String,
        token: Option<String>,
    }

    impl HttpRecommendationGateway {
        pub fn new(base_url: &str) -> Self {
            Self::with_client(reqwest::Client::new(), base_url)
        }

        pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
            Self {
                client,
                endpoint: endpoint(base_url),
                token: None,
            }
        }

        pub fn with_token(mut self, token: impl Into<String>) -> Self {
            self.token = Some(token.into());
            self
        }

        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    #[async_trait]
    impl RecommendationGateway for HttpRecommendationGateway {
        async fn create_recommendation(
            &self,
            request: RecommendationRequest,
        ) -> Result<RecommendationResult, GatewayError> {
            let mut builder = self.client.post(&self.endpoint);
            builder = match &request {
                RecommendationRequest::FromFile(file_id) => {
                    builder.query(&[("file_id", file_id.as_str())])
                }
                RecommendationRequest::FromEdits(edits) => builder.json(edits),
            };
            if let Some(token) = &self.token {
                builder = builder.bearer_auth(token);
            }

            debug!(kind = request.kind(), endpoint = %self.endpoint, "Sending recommendation request");

            let response = builder.send().await.map_err(|e| {
                error!("Recommendation request failed: {}", e);
                GatewayError::Transport(e.to_string())
            })?;
            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            if status == StatusCode::NOT_FOUND {
                let id = match &request {
                    RecommendationRequest::FromFile(file_id) => file_id.to_string(),
                    RecommendationRequest::FromEdits(_) => error_detail(&body),
                };
                return Err(GatewayError::UnknownFile(id));
            }
            if !status.is_success() {
                return Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message: error_detail(&body),
                });
            }

            RecommendationResult::from_slice(&body)
        }
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), RECOMMENDATIONS_PATH)
    }

    /// Pull the human-readable part out of an error body. The API reports
    /// errors as `{"detail": "..."}`; anything else is passed through as text.
    pub(super) fn error_detail(body: &[u8]) -> String {
        serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_endpoint_normalizes_trailing_slash() {
            assert_eq!(
                endpoint("http://localhost:8000/"),
                "http://localhost:8000/api/v1/recommendations/"
            );
            assert_eq!(
                HttpRecommendationGateway::new("http://api").endpoint(),
                "http://api/api/v1/recommendations/"
            );
        }

        #[test]
        fn test_error_detail_prefers_detail_field() {
            assert_eq!(error_detail(br#"{"detail":"File not found"}"#), "File not found");
            assert_eq!(error_detail(b"  gateway timeout \n"), "gateway timeout");
        }
    }
}
