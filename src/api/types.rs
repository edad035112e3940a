//! Shared types for the HTTP API layer.

use std::sync::Arc;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::Actor;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run a synchronous workflow on the blocking pool. Record-store and
    /// collaborator calls block, so handlers never call them inline.
    pub async fn run_blocking<T, E, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&CoreState) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        ApiError: From<E>,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || work(&core))
            .await
            .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
            .map_err(ApiError::from)
    }
}

// ═══════════════════════════════════════════════════════════
// Session context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated back-office caller, injected into request extensions
/// by the auth middleware after the bearer token is validated.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub actor: Actor,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::test_harness;
    use crate::error::WorkflowError;

    #[tokio::test]
    async fn run_blocking_returns_value() {
        let ctx = ApiContext::new(test_harness(false).core);
        let name = ctx
            .run_blocking(|core| Ok::<_, WorkflowError>(core.config.business_name.clone()))
            .await
            .unwrap();
        assert_eq!(name, "Health Wise");
    }

    #[tokio::test]
    async fn run_blocking_maps_workflow_errors() {
        let ctx = ApiContext::new(test_harness(false).core);
        let err = ctx
            .run_blocking(|_| Err::<(), _>(WorkflowError::validation("bad")))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "bad"));
    }
}
