use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage availability and cache occupancy, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_player_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let directory = state.directory();
    HealthResponse::new(
        state.is_degraded(),
        directory.len(),
        directory.parked().len(),
    )
}
