mod memory;
pub mod mongodb;

pub use memory::{InMemoryPlayerStore, StoreCalls};

use futures::future::BoxFuture;
use ::mongodb::bson::Document;

use crate::{dao::storage::StorageResult, state::player::PlayerId};

/// Result of an insert against the unique `id` index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was created by this call.
    Inserted,
    /// Another writer created the record first.
    AlreadyExists,
}

/// `$set` of some top-level fields of one player record.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerUpdate {
    /// Player whose record is written.
    pub id: PlayerId,
    /// Top-level fields to `$set`.
    pub fields: Document,
}

/// Abstraction over the durable store holding player records.
///
/// Both update paths upsert: a record missing from the store is created from
/// the written fields.
pub trait PlayerStore: Send + Sync {
    /// Record of `id`, if any.
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<Document>>>;
    /// Create a record unless one with the same `id` exists.
    fn insert_player(&self, record: Document) -> BoxFuture<'static, StorageResult<InsertOutcome>>;
    /// `$set` the fields of one record.
    fn update_player(&self, update: PlayerUpdate) -> BoxFuture<'static, StorageResult<()>>;
    /// Submit every update as a single batched write.
    fn bulk_update_players(
        &self,
        updates: Vec<PlayerUpdate>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round trip proving the store answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
