use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteError, WriteFailure},
    options::{IndexOptions, UpdateOneModel, WriteModel},
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
};
use crate::{
    dao::{
        models::{ID_FIELD, PLAYER_COLLECTION, query_key},
        player_store::{InsertOutcome, PlayerStore, PlayerUpdate},
        storage::StorageResult,
    },
    state::player::PlayerId,
};

const DUPLICATE_KEY: i32 = 11000;

/// [`PlayerStore`] backed by the `players` collection.
#[derive(Clone)]
pub struct MongoPlayerStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoPlayerStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { ID_FIELD: 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("player_id_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        self.collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION,
                index: ID_FIELD,
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(PLAYER_COLLECTION)
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn find_player(&self, id: PlayerId) -> MongoResult<Option<Document>> {
        self.collection()
            .await
            .find_one(query_key(id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { id, source })
    }

    async fn insert_player(&self, record: Document) -> MongoResult<InsertOutcome> {
        match self.collection().await.insert_one(record).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_duplicate_key(&err) => Ok(InsertOutcome::AlreadyExists),
            Err(source) => Err(MongoDaoError::InsertPlayer { source }),
        }
    }

    async fn update_player(&self, update: PlayerUpdate) -> MongoResult<()> {
        let PlayerUpdate { id, fields } = update;
        self.collection()
            .await
            .update_one(query_key(id), doc! { "$set": fields })
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::UpdatePlayer { id, source })?;
        Ok(())
    }

    /// One client-level bulk write for every update. Unordered, so one bad
    /// record does not hold back the others.
    async fn bulk_update_players(&self, updates: Vec<PlayerUpdate>) -> MongoResult<()> {
        let count = updates.len();
        let namespace = self.collection().await.namespace();
        let models: Vec<WriteModel> = updates
            .into_iter()
            .map(|PlayerUpdate { id, fields }| {
                UpdateOneModel::builder()
                    .namespace(namespace.clone())
                    .filter(query_key(id))
                    .update(doc! { "$set": fields })
                    .upsert(true)
                    .build()
                    .into()
            })
            .collect();

        let result = self
            .client()
            .await
            .bulk_write(models)
            .ordered(false)
            .bypass_document_validation(true)
            .await
            .map_err(|source| MongoDaoError::BulkUpdate { count, source })?;

        debug!(
            count,
            matched = result.matched_count,
            upserted = result.upserted_count,
            "bulk player update applied"
        );
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY,
            ..
        }))
    )
}

impl PlayerStore for MongoPlayerStore {
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(id).await.map_err(Into::into) })
    }

    fn insert_player(&self, record: Document) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.insert_player(record).await.map_err(Into::into) })
    }

    fn update_player(&self, update: PlayerUpdate) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_player(update).await.map_err(Into::into) })
    }

    fn bulk_update_players(
        &self,
        updates: Vec<PlayerUpdate>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.bulk_update_players(updates).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
