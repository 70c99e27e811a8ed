pub mod cache;
pub mod catalog;
pub mod directory;
pub mod player;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::player_store::PlayerStore,
    error::ServiceError,
    services::persistence::PlayerSynchronizer,
    state::{catalog::Catalog, directory::PlayerDirectory},
};

/// State shared by handlers and background jobs.
pub type SharedState = Arc<AppState>;

/// Central application state: the player directory, the storage handle and
/// the runtime configuration.
pub struct AppState {
    player_store: RwLock<Option<Arc<dyn PlayerStore>>>,
    degraded: watch::Sender<bool>,
    directory: PlayerDirectory,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            player_store: RwLock::new(None),
            degraded: degraded_tx,
            directory: PlayerDirectory::new(config.cache.ttl),
            config,
        })
    }

    /// Obtain a handle to the current player store, if one is installed.
    pub async fn player_store(&self) -> Option<Arc<dyn PlayerStore>> {
        let guard = self.player_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] while storage is unavailable.
    pub async fn require_player_store(&self) -> Result<Arc<dyn PlayerStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.player_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new player store implementation and leave degraded mode.
    pub async fn set_player_store(&self, store: Arc<dyn PlayerStore>) {
        {
            let mut guard = self.player_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current player store and enter degraded mode.
    pub async fn clear_player_store(&self) {
        {
            let mut guard = self.player_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Directory of players currently held in memory.
    pub fn directory(&self) -> &PlayerDirectory {
        &self.directory
    }

    /// Configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Read-only item definitions.
    pub fn catalog(&self) -> &Catalog {
        &self.config.catalog
    }

    /// Synchronizer bound to the current store.
    pub async fn synchronizer(&self) -> Result<PlayerSynchronizer, ServiceError> {
        let store = self.require_player_store().await?;
        Ok(PlayerSynchronizer::new(
            store,
            self.config.persistence.store_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::player_store::InMemoryPlayerStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();

        assert!(state.is_degraded());
        assert!(matches!(
            state.require_player_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_player_store(Arc::new(InMemoryPlayerStore::new()))
            .await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_player_store().await.is_ok());

        state.update_degraded(true);
        assert!(matches!(
            state.synchronizer().await,
            Err(ServiceError::Degraded)
        ));
    }
}
