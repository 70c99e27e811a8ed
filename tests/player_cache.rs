use std::{sync::Arc, time::Duration};

use bravo_back::{
    config::AppConfig,
    dao::player_store::InMemoryPlayerStore,
    dto::player::{CurrencyAdjustmentRequest, CurrencyOperation, HandleQuery},
    error::ServiceError,
    services::{
        persistence::{FlushOutcome, PlayerSynchronizer},
        player_service, scheduler,
    },
    state::{
        AppState, SharedState,
        catalog::CosmeticSlot,
        player::{CurrencyType, Player, PlayerId, SettingType, StatType, StatisticType},
    },
};
use mongodb::bson::doc;
use tokio::time::{Instant, advance};

fn config() -> AppConfig {
    AppConfig::from_json(include_str!("../config/app.json")).expect("sample config parses")
}

async fn state_with_store() -> (SharedState, InMemoryPlayerStore) {
    let state = AppState::new(config());
    let store = InMemoryPlayerStore::new();
    state.set_player_store(Arc::new(store.clone())).await;
    (state, store)
}

fn query(id: i64, insert: bool) -> HandleQuery {
    HandleQuery {
        id,
        name: None,
        insert,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_load_or_create_yields_one_player() {
    let (state, store) = state_with_store().await;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move { player_service::handle(&state, query(42, true)).await })
        })
        .collect();
    for task in tasks {
        let player = task.await.unwrap().unwrap();
        assert_eq!(player.id, 42);
    }

    assert_eq!(store.len(), 1);
    assert_eq!(state.directory().len(), 1);
    let first = state.directory().resolve(PlayerId(42)).unwrap();
    let second = state.directory().resolve(PlayerId(42)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn new_player_is_persisted_then_served_from_memory() {
    let (state, store) = state_with_store().await;

    let created = player_service::handle(&state, query(42, true)).await.unwrap();
    assert_eq!(created.currencies.unwrap()[&CurrencyType::Gold], 0.0);
    let stored = store.record(PlayerId(42)).unwrap();
    assert_eq!(stored.get_document("currencies").unwrap().get_f64("GOLD").unwrap(), 0.0);

    let finds = store.calls().finds;
    let before = state.directory().resolve(PlayerId(42)).unwrap();
    player_service::handle(&state, query(42, false)).await.unwrap();
    let after = state.directory().resolve(PlayerId(42)).unwrap();

    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(store.calls().finds, finds);
}

#[tokio::test]
async fn clamped_balance_is_what_gets_flushed() {
    let (state, store) = state_with_store().await;
    player_service::handle(&state, query(7, true)).await.unwrap();

    let adjust = |operation, amount| CurrencyAdjustmentRequest {
        currency: CurrencyType::Gold,
        operation,
        amount,
    };
    player_service::adjust_currency(&state, PlayerId(7), adjust(CurrencyOperation::Set, 100.0))
        .await
        .unwrap();
    let balance = player_service::adjust_currency(
        &state,
        PlayerId(7),
        adjust(CurrencyOperation::Remove, 150.0),
    )
    .await
    .unwrap();
    assert_eq!(balance.balance, 0.0);

    let (outcome, _) = scheduler::flush_all(&state).await;
    assert_eq!(outcome, FlushOutcome::Single);
    let stored = store.record(PlayerId(7)).unwrap();
    assert_eq!(stored.get_document("currencies").unwrap().get_f64("GOLD").unwrap(), 0.0);
}

#[tokio::test]
async fn stored_record_round_trips() {
    let config = config();
    let store = InMemoryPlayerStore::new();
    let sync = PlayerSynchronizer::new(Arc::new(store.clone()), Duration::from_secs(1));

    let mut player = Player::new(PlayerId(11), "Round Trip");
    player.currencies.set(CurrencyType::Gold, 250.5);
    player.stats.set(StatType::Level, 12.0);
    player.statistics.set(StatisticType::Win, 3.0);
    player.settings.set(SettingType::Music, 0);
    let pet = player
        .inventory
        .add_cosmetic(&config.catalog, CosmeticSlot::Pet, 2, 100)
        .unwrap();
    player
        .inventory
        .add_cosmetic(&config.catalog, CosmeticSlot::Trail, 3, 100)
        .unwrap();
    player.inventory.pets.set_active(pet, true).unwrap();
    player.inventory.add_product(&config.catalog, 1001, 4).unwrap();

    sync.create_if_absent(&player).await.unwrap();
    let loaded = sync.load_existing(PlayerId(11)).await.unwrap().unwrap();

    assert_eq!(loaded, player);
    assert!(loaded.inventory.pets.get(pet).unwrap().active);
}

#[tokio::test]
async fn flush_batches_by_snapshot_size() {
    let (state, store) = state_with_store().await;
    player_service::handle(&state, query(1, true)).await.unwrap();

    scheduler::flush_all(&state).await;
    assert_eq!(store.calls().updates, 1);
    assert_eq!(store.calls().bulk_updates, 0);

    for id in 2..=5 {
        player_service::handle(&state, query(id, true)).await.unwrap();
    }
    let (outcome, _) = scheduler::flush_all(&state).await;

    assert_eq!(outcome, FlushOutcome::Batch(5));
    assert_eq!(store.calls().bulk_updates, 1);
    assert_eq!(store.bulk_sizes(), vec![5]);
}

#[tokio::test(start_paused = true)]
async fn idle_player_is_evicted_and_reloaded() {
    let (state, store) = state_with_store().await;
    let first_instance = {
        player_service::handle(&state, query(5, true)).await.unwrap();
        state.directory().resolve(PlayerId(5)).unwrap()
    };

    advance(Duration::from_secs(14 * 60)).await;
    scheduler::sweep_and_flush_parked(&state).await;
    assert!(state.directory().contains(PlayerId(5)));

    // Not touched since t=0.
    advance(Duration::from_secs(2 * 60)).await;
    scheduler::sweep_and_flush_parked(&state).await;
    assert!(!state.directory().contains(PlayerId(5)));
    assert!(state.directory().parked().is_empty());

    let finds = store.calls().finds;
    player_service::handle(&state, query(5, false)).await.unwrap();
    assert_eq!(store.calls().finds, finds + 1);
    let reloaded = state.directory().resolve(PlayerId(5)).unwrap();
    assert!(!Arc::ptr_eq(&first_instance, &reloaded));
}

#[tokio::test(start_paused = true)]
async fn touched_player_outlives_its_first_deadline() {
    let (state, _) = state_with_store().await;
    player_service::handle(&state, query(8, true)).await.unwrap();

    advance(Duration::from_secs(10 * 60)).await;
    assert!(state.directory().resolve(PlayerId(8)).is_some());

    advance(Duration::from_secs(10 * 60)).await;
    assert_eq!(state.directory().sweep(Instant::now()), 0);

    advance(Duration::from_secs(5 * 60)).await;
    assert_eq!(state.directory().sweep(Instant::now()), 1);
}

#[tokio::test]
async fn failed_flush_keeps_unsaved_state() {
    let (state, store) = state_with_store().await;
    player_service::handle(&state, query(3, true)).await.unwrap();
    let handle = state.directory().resolve(PlayerId(3)).unwrap();
    handle.write().await.currencies.set(CurrencyType::Gold, 77.0);

    store.set_failing(true);
    let (outcome, _) = scheduler::flush_all(&state).await;
    assert_eq!(outcome, FlushOutcome::Failed);
    assert_eq!(state.directory().len(), 1);

    store.set_failing(false);
    scheduler::flush_all(&state).await;
    let stored = store.record(PlayerId(3)).unwrap();
    assert_eq!(stored.get_document("currencies").unwrap().get_f64("GOLD").unwrap(), 77.0);
}

#[tokio::test]
async fn load_failures_reach_the_caller_and_cache_nothing() {
    let (state, store) = state_with_store().await;
    store.put_record(
        PlayerId(9),
        doc! { "id": 9_i64, "name": "broken", "currencies": { "SILVER": 1.0 } },
    );

    let malformed = player_service::handle(&state, query(9, true)).await;
    assert!(matches!(malformed, Err(ServiceError::MalformedRecord(_))));
    assert!(!state.directory().contains(PlayerId(9)));

    store.set_failing(true);
    let unavailable = player_service::handle(&state, query(10, true)).await;
    assert!(matches!(unavailable, Err(ServiceError::Unavailable(_))));
    assert!(state.directory().is_empty());
}
