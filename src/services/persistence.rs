//! Write-behind bridge between the player directory and the durable store.

use std::{future::Future, sync::Arc, time::Duration};

use mongodb::bson::Document;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::{
    dao::{
        models::{PlayerField, RecordError, decode_player, encode_fields, encode_player, query_key},
        player_store::{InsertOutcome, PlayerStore, PlayerUpdate},
        storage::StorageResult,
    },
    error::ServiceError,
    state::player::{Player, PlayerHandle, PlayerId},
};

/// What a flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to write.
    Idle,
    /// One player written with a single-record update.
    Single,
    /// This many players written with one bulk call.
    Batch(usize),
    /// The write failed; state stays in memory for the next attempt.
    Failed,
    /// No store available (degraded mode).
    Skipped,
}

impl FlushOutcome {
    /// Label used in logs and flush responses.
    pub fn as_str(self) -> &'static str {
        match self {
            FlushOutcome::Idle => "idle",
            FlushOutcome::Single => "single",
            FlushOutcome::Batch(_) => "batch",
            FlushOutcome::Failed => "failed",
            FlushOutcome::Skipped => "skipped",
        }
    }

    /// Players durably written.
    pub fn written(self) -> usize {
        match self {
            FlushOutcome::Single => 1,
            FlushOutcome::Batch(count) => count,
            FlushOutcome::Idle | FlushOutcome::Failed | FlushOutcome::Skipped => 0,
        }
    }

    /// Whether nothing was left unwritten because of an error.
    pub fn succeeded(self) -> bool {
        matches!(
            self,
            FlushOutcome::Idle | FlushOutcome::Single | FlushOutcome::Batch(_)
        )
    }
}

/// Converts players to records and moves them in and out of the store.
///
/// Every store round trip is bounded by the configured timeout.
#[derive(Clone)]
pub struct PlayerSynchronizer {
    store: Arc<dyn PlayerStore>,
    timeout: Duration,
}

impl PlayerSynchronizer {
    /// Bind `store`, bounding each call by `timeout`.
    pub fn new(store: Arc<dyn PlayerStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Lookup key of the player's record.
    pub fn to_query_key(player: &Player) -> Document {
        query_key(player.id())
    }

    /// Full record, or only `fields` when given.
    pub fn to_record(
        player: &Player,
        fields: Option<&[PlayerField]>,
    ) -> Result<Document, RecordError> {
        match fields {
            Some(fields) => encode_fields(player, fields),
            None => encode_player(player),
        }
    }

    /// Point lookup used on a directory miss.
    ///
    /// A timeout is reported as [`ServiceError::Timeout`], never as absence.
    pub async fn load_existing(&self, id: PlayerId) -> Result<Option<Player>, ServiceError> {
        let Some(record) = self.bounded(self.store.find_player(id)).await? else {
            return Ok(None);
        };

        match decode_player(record) {
            Ok(player) => Ok(Some(player)),
            Err(err) => {
                error!(player_id = %id, error = %err, "stored player record is malformed");
                Err(ServiceError::MalformedRecord(format!("player {id}: {err}")))
            }
        }
    }

    /// Persist a brand-new player unless a record already exists.
    ///
    /// Losing an insert race is a success: the returned outcome tells the
    /// caller the stored record was written by someone else.
    pub async fn create_if_absent(&self, player: &Player) -> Result<InsertOutcome, ServiceError> {
        let id = player.id();
        if self.bounded(self.store.find_player(id)).await?.is_some() {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let record = Self::to_record(player, None)
            .map_err(|err| ServiceError::MalformedRecord(format!("player {id}: {err}")))?;
        let outcome = self.bounded(self.store.insert_player(record)).await?;
        if outcome == InsertOutcome::AlreadyExists {
            debug!(player_id = %id, "player created concurrently; keeping the stored record");
        }
        Ok(outcome)
    }

    /// Write the current in-memory state of `players`.
    ///
    /// One player goes through a single update, more through one bulk call.
    /// Failures are logged and reported as [`FlushOutcome::Failed`]; nothing
    /// is removed from memory.
    pub async fn flush(&self, players: &[PlayerHandle]) -> FlushOutcome {
        let mut updates = Vec::with_capacity(players.len());
        for handle in players {
            let player = handle.read().await;
            match Self::to_record(&player, Some(&PlayerField::ALL)) {
                Ok(fields) => updates.push(PlayerUpdate {
                    id: player.id(),
                    fields,
                }),
                Err(err) => {
                    error!(player_id = %player.id(), error = %err, "player could not be encoded; flush aborted");
                    return FlushOutcome::Failed;
                }
            }
        }

        match updates.len() {
            0 => FlushOutcome::Idle,
            1 => {
                let Some(update) = updates.pop() else {
                    return FlushOutcome::Idle;
                };
                let id = update.id;
                match self.bounded(self.store.update_player(update)).await {
                    Ok(()) => {
                        debug!(player_id = %id, "player flushed");
                        FlushOutcome::Single
                    }
                    Err(err) => {
                        error!(player_id = %id, error = %err, "player flush failed; retrying next cycle");
                        FlushOutcome::Failed
                    }
                }
            }
            count => match self.bounded(self.store.bulk_update_players(updates)).await {
                Ok(()) => {
                    debug!(count, "players flushed in bulk");
                    FlushOutcome::Batch(count)
                }
                Err(err) => {
                    error!(count, error = %err, "bulk player flush failed; retrying next cycle");
                    FlushOutcome::Failed
                }
            },
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = StorageResult<T>>,
    ) -> Result<T, ServiceError> {
        match timeout(self.timeout, call).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "player store call timed out");
                Err(ServiceError::Timeout)
            }
        }
    }
}
