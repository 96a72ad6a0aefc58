//! RecommendationRunner – claims the session's request slot, calls the gateway exactly **once**,
//! and commits the response back into the [`SessionStore`].
//!
//! ## When should you use `run`?
//! * **Single-owner hosts** (tests, CLIs, a UI event loop that owns its controllers): one call
//!   does claim → call → commit, and the slot is released however the call ends.
//!
//! ## When should you use `begin` + `send`?
//! * **Shared hosts** that keep controllers behind a lock. Claim the slot while holding the lock,
//!   release the lock, await [`PendingRecommendation::send`], then re-acquire the lock to let the
//!   controllers pick up the new result. A second trigger during the await is rejected with
//!   [`FlowError::RequestInFlight`] instead of queueing behind the lock.
//!
//! Either way a response that lands after the store was reset for a new upload is dropped and
//! reported as [`CommitOutcome::Discarded`]; that includes failures, which nobody is waiting for
//! any more.

use std::sync::Arc;
use tracing::{error, info};

use crate::{
    error::{FlowError, Result},
    gateway::{RecommendationGateway, RecommendationRequest},
    store::{CommitOutcome, RequestGuard, SessionStore},
};

#[derive(Clone)]
pub struct RecommendationRunner {
    gateway: Arc<dyn RecommendationGateway>,
    store: SessionStore,
}

impl RecommendationRunner {
    pub fn new(gateway: Arc<dyn RecommendationGateway>, store: SessionStore) -> Self {
        Self { gateway, store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Claim the request slot for `request` without sending it yet.
    pub fn begin(&self, request: RecommendationRequest) -> Result<PendingRecommendation> {
        let guard = self.store.begin_request()?;
        info!(
            kind = request.kind(),
            session_id = %guard.session_id(),
            "Recommendation request started"
        );
        Ok(PendingRecommendation {
            guard,
            request,
            gateway: self.gateway.clone(),
            store: self.store.clone(),
        })
    }

    pub async fn run(&self, request: RecommendationRequest) -> Result<CommitOutcome> {
        self.begin(request)?.send().await
    }
}

/// A claimed request slot plus the request that will use it.
pub struct PendingRecommendation {
    guard: RequestGuard,
    request: RecommendationRequest,
    gateway: Arc<dyn RecommendationGateway>,
    store: SessionStore,
}

impl PendingRecommendation {
    pub fn request(&self) -> &RecommendationRequest {
        &self.request
    }

    /// Call the gateway and commit the response. On failure the store is left
    /// exactly as it was.
    pub async fn send(self) -> Result<CommitOutcome> {
        let Self {
            guard,
            request,
            gateway,
            store,
        } = self;

        let response = gateway.create_recommendation(request).await;

        if !guard.is_current() {
            info!(
                session_id = %guard.session_id(),
                "Session changed while request was pending, dropping response"
            );
            return Ok(CommitOutcome::Discarded);
        }

        match response {
            Ok(result) => Ok(store.commit(guard, result)),
            Err(e) => {
                error!(session_id = %guard.session_id(), "Recommendation failed: {}", e);
                Err(FlowError::Gateway(e))
            }
        }
    }
}
