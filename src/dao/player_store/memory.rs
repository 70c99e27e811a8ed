//! Process-local player store.
//!
//! Mirrors the MongoDB adapter (unique key, `$set` merge, upserts) so the
//! service can run without a database and tests can count round trips.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use mongodb::bson::{Bson, Document};

use super::{InsertOutcome, PlayerStore, PlayerUpdate};
use crate::{
    dao::{
        models::ID_FIELD,
        storage::{StorageError, StorageResult},
    },
    state::player::PlayerId,
};

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    /// `find_player` calls.
    pub finds: usize,
    /// `insert_player` calls.
    pub inserts: usize,
    /// `update_player` calls.
    pub updates: usize,
    /// `bulk_update_players` calls.
    pub bulk_updates: usize,
}

/// Player store backed by a concurrent map, with call counters and a failure switch.
#[derive(Clone, Default)]
pub struct InMemoryPlayerStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    records: DashMap<i64, Document>,
    failing: AtomicBool,
    finds: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    bulk_updates: AtomicUsize,
    bulk_sizes: std::sync::Mutex<Vec<usize>>,
}

impl InMemoryPlayerStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls received so far.
    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            finds: self.inner.finds.load(Ordering::SeqCst),
            inserts: self.inner.inserts.load(Ordering::SeqCst),
            updates: self.inner.updates.load(Ordering::SeqCst),
            bulk_updates: self.inner.bulk_updates.load(Ordering::SeqCst),
        }
    }

    /// Number of updates carried by each bulk call, in call order.
    pub fn bulk_sizes(&self) -> Vec<usize> {
        self.inner
            .bulk_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }

    /// Stored record for `id`, bypassing counters and the failure switch.
    pub fn record(&self, id: PlayerId) -> Option<Document> {
        self.inner
            .records
            .get(&id.0)
            .map(|record| record.value().clone())
    }

    /// Seed a record directly.
    pub fn put_record(&self, id: PlayerId, record: Document) {
        self.inner.records.insert(id.0, record);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// Whether no record is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }
}

impl MemoryInner {
    fn check(&self, operation: &str) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                format!("in-memory store refused {operation}"),
                io::Error::new(io::ErrorKind::ConnectionRefused, "store offline"),
            ));
        }
        Ok(())
    }

    fn find(&self, id: PlayerId) -> StorageResult<Option<Document>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.check("find")?;
        Ok(self.records.get(&id.0).map(|record| record.value().clone()))
    }

    fn insert(&self, record: Document) -> StorageResult<InsertOutcome> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.check("insert")?;
        let id = match record.get(ID_FIELD) {
            Some(Bson::Int64(id)) => *id,
            Some(Bson::Int32(id)) => i64::from(*id),
            _ => {
                return Err(StorageError::unavailable(
                    "record without an integer id",
                    io::Error::new(io::ErrorKind::InvalidInput, "missing id"),
                ));
            }
        };

        match self.records.entry(id) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyExists),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    fn apply(&self, update: PlayerUpdate) {
        let mut record = self.records.entry(update.id.0).or_insert_with(|| {
            let mut record = Document::new();
            record.insert(ID_FIELD, update.id.0);
            record
        });
        for (key, value) in update.fields {
            record.insert(key, value);
        }
    }
}

impl PlayerStore for InMemoryPlayerStore {
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.find(id) })
    }

    fn insert_player(&self, record: Document) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert(record) })
    }

    fn update_player(&self, update: PlayerUpdate) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.updates.fetch_add(1, Ordering::SeqCst);
            store.inner.check("update")?;
            store.inner.apply(update);
            Ok(())
        })
    }

    fn bulk_update_players(
        &self,
        updates: Vec<PlayerUpdate>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.bulk_updates.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut sizes) = store.inner.bulk_sizes.lock() {
                sizes.push(updates.len());
            }
            store.inner.check("bulk update")?;
            for update in updates {
                store.inner.apply(update);
            }
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.check("ping") })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.check("reconnect") })
    }
}
