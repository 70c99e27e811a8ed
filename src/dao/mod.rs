/// Stored record format of a player.
pub mod models;
/// Persistence adapters for player records.
pub mod player_store;
/// Backend-agnostic storage errors.
pub mod storage;
