//! Periodic flush and TTL sweep jobs.

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, warn};

use crate::{services::persistence::FlushOutcome, state::SharedState};

/// Write every live and parked player, then release the parked ones that
/// made it to storage. Returns the outcome and the number released.
pub async fn flush_all(state: &SharedState) -> (FlushOutcome, usize) {
    let synchronizer = match state.synchronizer().await {
        Ok(synchronizer) => synchronizer,
        Err(_) => {
            warn!("storage unavailable (degraded mode); skipping flush");
            return (FlushOutcome::Skipped, 0);
        }
    };

    let directory = state.directory();
    let parked = directory.parked();
    let mut players = directory.snapshot();
    players.extend(parked.iter().cloned());

    let outcome = synchronizer.flush(&players).await;
    let released = if outcome.succeeded() {
        directory.release_parked(&parked)
    } else {
        0
    };
    (outcome, released)
}

/// Expire idle entries and give the evicted players their final write.
pub async fn sweep_and_flush_parked(state: &SharedState) -> usize {
    let directory = state.directory();
    let evicted = directory.sweep(Instant::now());
    if evicted > 0 {
        debug!(count = evicted, "idle players evicted");
    }

    let parked = directory.parked();
    if parked.is_empty() {
        return 0;
    }

    let Ok(synchronizer) = state.synchronizer().await else {
        warn!(
            count = parked.len(),
            "storage unavailable (degraded mode); keeping evicted players in memory"
        );
        return 0;
    };

    if synchronizer.flush(&parked).await.succeeded() {
        directory.release_parked(&parked)
    } else {
        0
    }
}

/// Handles of the running background jobs.
pub struct BackgroundJobs {
    state: SharedState,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundJobs {
    /// Start the flush and sweep jobs on the current runtime.
    pub fn spawn(state: SharedState) -> Self {
        let (shutdown, _rx) = watch::channel(false);
        let handles = vec![
            tokio::spawn(run_flush_job(state.clone(), shutdown.subscribe())),
            tokio::spawn(run_sweep_job(state.clone(), shutdown.subscribe())),
        ];

        let persistence = &state.config().persistence;
        info!(
            initial_delay_secs = persistence.initial_delay.as_secs(),
            period_secs = persistence.period.as_secs(),
            sweep_interval_secs = state.config().cache.sweep_interval.as_secs(),
            "background jobs started"
        );

        Self {
            state,
            shutdown,
            handles,
        }
    }

    /// Stop both jobs and run a best-effort final flush.
    pub async fn shutdown(self) -> (FlushOutcome, usize) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "background job ended abnormally");
            }
        }

        let (outcome, released) = flush_all(&self.state).await;
        info!(
            outcome = outcome.as_str(),
            written = outcome.written(),
            released,
            "final flush complete"
        );
        (outcome, released)
    }
}

async fn run_flush_job(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let persistence = &state.config().persistence;
    let mut ticker = interval_at(
        Instant::now() + persistence.initial_delay,
        persistence.period,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (outcome, released) = flush_all(&state).await;
                debug!(
                    outcome = outcome.as_str(),
                    written = outcome.written(),
                    released,
                    "scheduled flush"
                );
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn run_sweep_job(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let every = state.config().cache.sweep_interval;
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sweep_and_flush_parked(&state).await;
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::sleep;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::player_store::InMemoryPlayerStore,
        state::{
            AppState,
            player::{CurrencyType, Player, PlayerId},
        },
    };

    async fn running_state() -> (SharedState, InMemoryPlayerStore) {
        let state = AppState::new(AppConfig::default());
        let store = InMemoryPlayerStore::new();
        state.set_player_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test(start_paused = true)]
    async fn first_flush_waits_for_the_initial_delay() {
        let (state, store) = running_state().await;
        state.directory().insert(Player::new(PlayerId(1), "a"));
        let jobs = BackgroundJobs::spawn(state.clone());

        sleep(Duration::from_secs(299)).await;
        assert_eq!(store.calls().updates, 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(store.calls().updates, 1);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(store.calls().updates, 2);

        jobs.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_players_are_written_before_release() {
        let (state, store) = running_state().await;
        let handle = state.directory().insert(Player::new(PlayerId(5), "idle"));
        handle.write().await.currencies.set(CurrencyType::Gold, 9.0);
        let jobs = BackgroundJobs::spawn(state.clone());

        // TTL is 15 minutes; the sweep runs every 30 seconds.
        sleep(Duration::from_secs(15 * 60 + 31)).await;

        assert!(state.directory().is_empty());
        assert!(state.directory().parked().is_empty());
        let record = store.record(PlayerId(5)).unwrap();
        assert_eq!(
            record.get_document("currencies").unwrap().get_f64("GOLD").unwrap(),
            9.0
        );

        jobs.shutdown().await;
    }

    #[tokio::test]
    async fn failed_flush_keeps_parked_players() {
        let (state, store) = running_state().await;
        let now = Instant::now();
        state
            .directory()
            .insert_at(Player::new(PlayerId(3), "p"), now);
        state.directory().sweep(now + state.directory().ttl());
        store.set_failing(true);

        let (outcome, released) = flush_all(&state).await;
        assert_eq!(outcome, FlushOutcome::Failed);
        assert_eq!(released, 0);
        assert_eq!(state.directory().parked().len(), 1);

        store.set_failing(false);
        let (outcome, released) = flush_all(&state).await;
        assert_eq!(outcome, FlushOutcome::Single);
        assert_eq!(released, 1);
    }

    #[tokio::test]
    async fn degraded_flush_is_skipped() {
        let state = AppState::new(AppConfig::default());
        state.directory().insert(Player::new(PlayerId(1), "a"));

        assert_eq!(flush_all(&state).await, (FlushOutcome::Skipped, 0));
        assert_eq!(state.directory().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_runs_the_final_flush() {
        let (state, store) = running_state().await;
        for id in 1..=3 {
            state.directory().insert(Player::new(PlayerId(id), "p"));
        }
        let jobs = BackgroundJobs::spawn(state.clone());

        let (outcome, _) = jobs.shutdown().await;

        assert_eq!(outcome, FlushOutcome::Batch(3));
        assert_eq!(store.bulk_sizes(), vec![3]);
    }
}
