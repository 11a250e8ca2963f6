//! FlowEngine — derives and caches onboarding state per account.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::state::{FlowEvent, FlowState, derive_flow_state};
use crate::error::{DatabaseError, FlowError};
use crate::profile::{Account, Profile};
use crate::quiz::QuizCompletion;

/// The three reads the flow derivation needs.
#[async_trait]
pub trait FlowSource: Send + Sync {
    async fn fetch_account(&self, user_id: &str) -> Result<Option<Account>, DatabaseError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    async fn fetch_quiz(
        &self,
        user_id: &str,
    ) -> Result<Option<QuizCompletion>, DatabaseError>;
}

/// Derives the flow state from a [`FlowSource`] and remembers the result so
/// completion events can advance it optimistically.
pub struct FlowEngine {
    source: Arc<dyn FlowSource>,
    timeout: Duration,
    states: RwLock<HashMap<String, FlowState>>,
}

impl FlowEngine {
    pub fn new(source: Arc<dyn FlowSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Read the records and classify, bounded by the configured timeout.
    pub async fn try_derive(&self, user_id: &str) -> Result<FlowState, FlowError> {
        let reads = async {
            let Some(account) = self.source.fetch_account(user_id).await? else {
                return Ok::<_, DatabaseError>(FlowState::Unauthenticated);
            };
            let profile = self.source.fetch_profile(user_id).await?;
            let quiz = self.source.fetch_quiz(user_id).await?;
            Ok(derive_flow_state(
                Some(&account),
                profile.as_ref(),
                quiz.as_ref(),
            ))
        };

        match tokio::time::timeout(self.timeout, reads).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(FlowError::Timeout(self.timeout)),
        }
    }

    /// Derive the state; any failure lands on `application`.
    pub async fn derive(&self, user_id: &str) -> FlowState {
        match self.try_derive(user_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Flow derivation failed, falling back to application");
                FlowState::Application
            }
        }
    }

    /// Re-derive from the backend and replace the cached state.
    pub async fn refresh(&self, user_id: &str) -> FlowState {
        let state = self.derive(user_id).await;
        let mut states = self.states.write().await;
        if state == FlowState::Unauthenticated {
            states.remove(user_id);
        } else {
            states.insert(user_id.to_string(), state);
        }
        debug!(user_id = %user_id, state = %state, "Flow state derived");
        state
    }

    /// Cached state, deriving it on first access.
    pub async fn current(&self, user_id: &str) -> FlowState {
        if let Some(state) = self.states.read().await.get(user_id).copied() {
            return state;
        }
        self.refresh(user_id).await
    }

    /// Advance the cached state without re-reading the backend.
    ///
    /// The next [`refresh`](Self::refresh) corrects it if the write behind
    /// the event did not persist.
    pub async fn advance(&self, user_id: &str, event: FlowEvent) -> Result<FlowState, FlowError> {
        let current = self.current(user_id).await;
        let next = current.apply(event)?;

        let mut states = self.states.write().await;
        if next == FlowState::Unauthenticated {
            states.remove(user_id);
        } else {
            states.insert(user_id.to_string(), next);
        }
        debug!(user_id = %user_id, from = %current, to = %next, event = %event, "Flow advanced");
        Ok(next)
    }

    /// Drop the cached state so the next access re-derives.
    pub async fn forget(&self, user_id: &str) {
        self.states.write().await.remove(user_id);
    }
}
