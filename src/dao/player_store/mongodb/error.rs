use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::state::player::PlayerId;

/// Result of a MongoDB adapter call.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failure of one MongoDB operation.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load player `{id}`")]
    LoadPlayer {
        id: PlayerId,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert player record")]
    InsertPlayer {
        #[source]
        source: MongoError,
    },
    #[error("failed to update player `{id}`")]
    UpdatePlayer {
        id: PlayerId,
        #[source]
        source: MongoError,
    },
    #[error("bulk update of {count} player(s) failed")]
    BulkUpdate {
        count: usize,
        #[source]
        source: MongoError,
    },
}
