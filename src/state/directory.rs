//! Concurrent map of loaded players.
//!
//! The directory guarantees at most one live [`PlayerHandle`] per id.
//! Entries expire after a period without access; an expired player is moved
//! to the *parked* set where it waits for its final write before being
//! dropped, so idle eviction never loses unsaved mutations.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use dashmap::{
    DashMap,
    mapref::entry::{Entry, OccupiedEntry},
};
use tokio::time::Instant;
use tracing::debug;

use crate::state::{
    cache::Cached,
    player::{Player, PlayerCell, PlayerHandle, PlayerId},
};

type CachedPlayer = Arc<Cached<PlayerHandle>>;

/// Cheaply clonable handle to the shared player directory.
#[derive(Clone)]
pub struct PlayerDirectory {
    inner: Arc<DirectoryInner>,
}

struct DirectoryInner {
    live: DashMap<PlayerId, CachedPlayer>,
    parked: DashMap<PlayerId, PlayerHandle>,
    ttl: Duration,
}

impl DirectoryInner {
    /// Expiry callback target. Moves a dead entry to the parked set.
    ///
    /// The live shard stays locked while parking so an insert can never
    /// observe the id as neither live nor parked.
    fn evict(&self, id: PlayerId) {
        if let Entry::Occupied(entry) = self.live.entry(id) {
            if !entry.get().is_dead() {
                return;
            }
            let handle = entry.get().value().clone();
            self.parked.insert(id, handle);
            entry.remove();
            debug!(player_id = %id, "player evicted from cache");
        }
    }
}

impl PlayerDirectory {
    /// Empty directory evicting players idle for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                live: DashMap::new(),
                parked: DashMap::new(),
                ttl,
            }),
        }
    }

    /// Idle time before eviction.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Live player for `id`, touching its entry.
    pub fn resolve(&self, id: PlayerId) -> Option<PlayerHandle> {
        self.resolve_at(id, Instant::now())
    }

    /// Same as [`resolve`](Self::resolve) with an explicit clock.
    ///
    /// An entry whose TTL elapsed but that was not swept yet is expired on the
    /// spot and reported absent.
    pub fn resolve_at(&self, id: PlayerId, now: Instant) -> Option<PlayerHandle> {
        let cached = self.inner.live.get(&id).map(|entry| entry.value().clone())?;

        if cached.expire_if_elapsed(now) || cached.is_dead() {
            return None;
        }
        if !cached.touch_at(now) {
            return None;
        }
        Some(cached.value().clone())
    }

    /// Insert `player` unless the id is already loaded.
    ///
    /// Returns the winning handle: the existing live entry when another caller
    /// got there first, a parked or expired-but-still-present aggregate when
    /// one exists (it holds fresher state than any stored record), or the
    /// newly inserted player otherwise.
    pub fn insert(&self, player: Player) -> PlayerHandle {
        self.insert_at(player, Instant::now())
    }

    /// Same as [`insert`](Self::insert) with an explicit clock.
    pub fn insert_at(&self, player: Player, now: Instant) -> PlayerHandle {
        let id = player.id();
        match self.inner.live.entry(id) {
            Entry::Occupied(entry) => self.keep_or_revive(entry, now),
            Entry::Vacant(entry) => {
                let handle = self
                    .take_parked(id)
                    .unwrap_or_else(|| PlayerCell::new(player));
                entry.insert(self.wrap(handle.clone(), now));
                handle
            }
        }
    }

    /// Bring a parked player back into the live map, if there is one.
    pub fn reclaim_parked(&self, id: PlayerId) -> Option<PlayerHandle> {
        self.reclaim_parked_at(id, Instant::now())
    }

    /// [`Self::reclaim_parked`] at a given instant.
    pub fn reclaim_parked_at(&self, id: PlayerId, now: Instant) -> Option<PlayerHandle> {
        if !self.inner.parked.contains_key(&id) {
            return None;
        }
        match self.inner.live.entry(id) {
            Entry::Occupied(entry) => Some(self.keep_or_revive(entry, now)),
            Entry::Vacant(entry) => {
                let handle = self.take_parked(id)?;
                entry.insert(self.wrap(handle.clone(), now));
                Some(handle)
            }
        }
    }

    fn keep_or_revive(
        &self,
        mut entry: OccupiedEntry<'_, PlayerId, CachedPlayer>,
        now: Instant,
    ) -> PlayerHandle {
        let current = entry.get().clone();
        if !current.is_expired(now) && current.touch_at(now) {
            return current.value().clone();
        }

        // Expired while still mapped: revive the same aggregate under a fresh
        // wrapper so there is never a second copy.
        current.retire();
        let handle = current.value().clone();
        self.inner
            .parked
            .remove_if(&handle.id(), |_, parked| Arc::ptr_eq(parked, &handle));
        entry.insert(self.wrap(handle.clone(), now));
        debug!(player_id = %handle.id(), "expired player revived");
        handle
    }

    fn take_parked(&self, id: PlayerId) -> Option<PlayerHandle> {
        let (_, handle) = self.inner.parked.remove(&id)?;
        debug!(player_id = %id, "parked player revived");
        Some(handle)
    }

    fn wrap(&self, handle: PlayerHandle, now: Instant) -> CachedPlayer {
        let directory: Weak<DirectoryInner> = Arc::downgrade(&self.inner);
        Arc::new(Cached::wrap(
            handle,
            self.inner.ttl,
            now,
            Box::new(move |id| {
                if let Some(directory) = directory.upgrade() {
                    directory.evict(id);
                }
            }),
        ))
    }

    /// Drop `id` from memory without parking it. Unsaved mutations are lost.
    pub fn remove(&self, id: PlayerId) -> Option<PlayerHandle> {
        let removed = self.inner.live.remove(&id).map(|(_, cached)| {
            cached.retire();
            cached.value().clone()
        });
        let parked = self.inner.parked.remove(&id).map(|(_, handle)| handle);
        removed.or(parked)
    }

    /// Point-in-time list of live players. No lock is held once this returns.
    pub fn snapshot(&self) -> Vec<PlayerHandle> {
        self.inner
            .live
            .iter()
            .filter(|entry| !entry.value().is_dead())
            .map(|entry| entry.value().value().clone())
            .collect()
    }

    /// Evicted players still waiting for their final write.
    pub fn parked(&self) -> Vec<PlayerHandle> {
        self.inner
            .parked
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Forget parked players once they were written. Entries revived in the
    /// meantime are kept.
    pub fn release_parked(&self, written: &[PlayerHandle]) -> usize {
        written
            .iter()
            .filter(|handle| {
                self.inner
                    .parked
                    .remove_if(&handle.id(), |_, parked| Arc::ptr_eq(parked, handle))
                    .is_some()
            })
            .count()
    }

    /// Expire every entry whose TTL elapsed at `now`. Returns how many were
    /// evicted.
    pub fn sweep(&self, now: Instant) -> usize {
        let candidates: Vec<CachedPlayer> = self
            .inner
            .live
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.value().clone())
            .collect();

        candidates
            .into_iter()
            .filter(|cached| cached.expire_if_elapsed(now))
            .count()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.live.len()
    }

    /// Whether no player is live.
    pub fn is_empty(&self) -> bool {
        self.inner.live.is_empty()
    }

    /// Whether `id` is currently live.
    pub fn contains(&self, id: PlayerId) -> bool {
        self.inner
            .live
            .get(&id)
            .is_some_and(|entry| !entry.value().is_dead())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::player::CurrencyType;

    const TTL: Duration = Duration::from_secs(15 * 60);

    fn player(id: i64) -> Player {
        Player::new(PlayerId(id), format!("player-{id}"))
    }

    #[test]
    fn second_insert_returns_the_first_instance() {
        let directory = PlayerDirectory::new(TTL);
        let now = Instant::now();

        let first = directory.insert_at(player(42), now);
        let mut loser = player(42);
        loser.name = "loser".into();
        let second = directory.insert_at(loser, now);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn resolve_touches_the_entry() {
        let directory = PlayerDirectory::new(TTL);
        let start = Instant::now();
        directory.insert_at(player(5), start);

        let mid = start + Duration::from_secs(10 * 60);
        assert!(directory.resolve_at(PlayerId(5), mid).is_some());

        // 20 minutes after insertion but only 10 after the touch.
        assert_eq!(directory.sweep(start + Duration::from_secs(20 * 60)), 0);
        assert!(directory.contains(PlayerId(5)));
        assert_eq!(directory.sweep(mid + TTL), 1);
        assert!(!directory.contains(PlayerId(5)));
    }

    #[test]
    fn expired_entries_are_parked_until_released() {
        let directory = PlayerDirectory::new(TTL);
        let start = Instant::now();
        let handle = directory.insert_at(player(5), start);

        assert!(
            directory
                .resolve_at(PlayerId(5), start + Duration::from_secs(16 * 60))
                .is_none()
        );
        assert!(directory.is_empty());

        let parked = directory.parked();
        assert_eq!(parked.len(), 1);
        assert!(Arc::ptr_eq(&parked[0], &handle));
        assert!(directory.snapshot().is_empty());

        assert_eq!(directory.release_parked(&parked), 1);
        assert!(directory.parked().is_empty());
    }

    #[tokio::test]
    async fn parked_player_is_revived_instead_of_reloaded() {
        let directory = PlayerDirectory::new(TTL);
        let start = Instant::now();
        let handle = directory.insert_at(player(7), start);
        handle.write().await.currencies.set(CurrencyType::Gold, 55.0);

        let later = start + TTL;
        assert_eq!(directory.sweep(later), 1);

        // A fresh load from storage would carry stale state.
        let revived = directory.insert_at(player(7), later);
        assert!(Arc::ptr_eq(&revived, &handle));
        assert_eq!(revived.read().await.currencies.get(CurrencyType::Gold), 55.0);
        assert!(directory.parked().is_empty());
        assert!(directory.contains(PlayerId(7)));
    }

    #[test]
    fn release_keeps_entries_that_were_revived() {
        let directory = PlayerDirectory::new(TTL);
        let start = Instant::now();
        directory.insert_at(player(3), start);
        directory.sweep(start + TTL);
        let parked = directory.parked();

        let revived = directory.reclaim_parked_at(PlayerId(3), start + TTL);
        assert!(revived.is_some());
        assert_eq!(directory.release_parked(&parked), 0);
        assert_eq!(directory.snapshot().len(), 1);
    }

    #[test]
    fn insert_over_an_unswept_expired_entry_keeps_the_same_aggregate() {
        let directory = PlayerDirectory::new(TTL);
        let start = Instant::now();
        let first = directory.insert_at(player(8), start);

        let second = directory.insert_at(player(8), start + TTL + Duration::from_secs(1));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(directory.len(), 1);
        assert!(directory.parked().is_empty());
    }

    #[test]
    fn remove_drops_without_parking() {
        let directory = PlayerDirectory::new(TTL);
        directory.insert(player(1));

        assert!(directory.remove(PlayerId(1)).is_some());
        assert!(directory.resolve(PlayerId(1)).is_none());
        assert!(directory.parked().is_empty());
    }

    #[test]
    fn concurrent_inserts_yield_a_single_instance() {
        let directory = PlayerDirectory::new(TTL);
        let handles: Vec<PlayerHandle> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..16)
                .map(|_| {
                    let directory = directory.clone();
                    scope.spawn(move || directory.insert(player(11)))
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .collect()
        });

        assert!(handles.iter().all(|handle| Arc::ptr_eq(handle, &handles[0])));
        assert_eq!(directory.len(), 1);
    }
}
