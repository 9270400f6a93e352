use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a health payload while logging history-store issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_history().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "history store health check failed");
            }
        }
        Err(_) => warn!("history store unavailable (degraded mode)"),
    }

    if state.is_degraded().await {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
