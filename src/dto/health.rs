use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Players currently held in memory.
    pub cached_players: usize,
    /// Evicted players still waiting for their final write.
    pub pending_writes: usize,
}

impl HealthResponse {
    /// Build the response from the degraded flag and cache counts.
    pub fn new(degraded: bool, cached_players: usize, pending_writes: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_owned(),
            cached_players,
            pending_writes,
        }
    }
}
