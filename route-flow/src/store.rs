use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{FlowError, Result},
    model::{AnalysisSession, RecommendationResult},
};

/// Identifies one upload-to-result lifetime. A new id is minted every time the
/// upload screen is entered, which is what lets late responses be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What happened to a response handed to [`SessionStore::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// The session moved on while the request was pending.
    Discarded,
}

/// Single source of truth for the current analysis and recommendation.
///
/// Cheap to clone; clones share state. Values are only ever replaced whole.
/// Observers hold a [`watch::Receiver`] from [`subscribe`](Self::subscribe) and
/// re-evaluate when it reports a change.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    session_id: watch::Sender<SessionId>,
    analysis: watch::Sender<Option<Arc<AnalysisSession>>>,
    result: watch::Sender<Option<Arc<RecommendationResult>>>,
    // 0 means idle, otherwise the sequence number of the pending request.
    in_flight: AtomicU64,
    next_seq: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                session_id: watch::Sender::new(SessionId::new()),
                analysis: watch::Sender::new(None),
                result: watch::Sender::new(None),
                in_flight: AtomicU64::new(0),
                next_seq: AtomicU64::new(1),
            }),
        }
    }

    pub fn session_id(&self) -> SessionId {
        *self.inner.session_id.borrow()
    }

    pub fn get(&self) -> Option<Arc<AnalysisSession>> {
        self.inner.analysis.borrow().clone()
    }

    pub fn set(&self, analysis: Option<AnalysisSession>) {
        self.inner.analysis.send_replace(analysis.map(Arc::new));
    }

    pub fn get_result(&self) -> Option<Arc<RecommendationResult>> {
        self.inner.result.borrow().clone()
    }

    pub fn set_result(&self, result: Option<RecommendationResult>) {
        self.inner.result.send_replace(result.map(Arc::new));
    }

    /// Observe recommendation results. The receiver starts out marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RecommendationResult>>> {
        self.inner.result.subscribe()
    }

    pub fn subscribe_analysis(&self) -> watch::Receiver<Option<Arc<AnalysisSession>>> {
        self.inner.analysis.subscribe()
    }

    /// Clear everything and start a new session. Anything still in flight for
    /// the previous session will be discarded when it lands.
    pub fn reset(&self) -> SessionId {
        let id = SessionId::new();
        self.inner.session_id.send_replace(id);
        self.inner.analysis.send_replace(None);
        self.inner.result.send_replace(None);
        self.inner.in_flight.store(0, Ordering::SeqCst);
        info!(session_id = %id, "Session store reset");
        id
    }

    pub fn is_request_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) != 0
    }

    /// Claim the single request slot for the current session.
    pub fn begin_request(&self) -> Result<RequestGuard> {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
        self.inner
            .in_flight
            .compare_exchange(0, seq, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| FlowError::RequestInFlight)?;

        Ok(RequestGuard {
            store: self.clone(),
            session_id: self.session_id(),
            seq,
        })
    }

    /// Apply a gateway response obtained under `guard`. The analysis and the
    /// result are both replaced, analysis first, so result observers always
    /// see the matching analysis.
    pub fn commit(&self, guard: RequestGuard, result: RecommendationResult) -> CommitOutcome {
        if guard.session_id != self.session_id() {
            debug!(
                request_session = %guard.session_id,
                current_session = %self.session_id(),
                "Discarding stale recommendation response"
            );
            return CommitOutcome::Discarded;
        }

        self.inner
            .analysis
            .send_replace(Some(Arc::new(result.analysis.clone())));
        self.inner.result.send_replace(Some(Arc::new(result)));
        info!(session_id = %guard.session_id, "Recommendation result applied");
        CommitOutcome::Applied
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the request slot for one outstanding gateway call. Dropping it
/// releases the slot, whether or not the response was committed.
pub struct RequestGuard {
    store: SessionStore,
    session_id: SessionId,
    seq: u64,
}

impl RequestGuard {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Whether the store still belongs to the session this request was made for.
    pub fn is_current(&self) -> bool {
        self.store.session_id() == self.session_id
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let _ = self.store.inner.in_flight.compare_exchange(
            self.seq,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

impl fmt::Debug for RequestGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestGuard")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}
