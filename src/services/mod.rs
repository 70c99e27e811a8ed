/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Write-behind synchronization with the player store.
pub mod persistence;
/// Player load-or-create, pushes and targeted mutations.
pub mod player_service;
/// Periodic flush and TTL sweep jobs.
pub mod scheduler;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
