mod utils;

use std::time::Duration;

use matchstats::{
    event::{MatchEvent, PlayerClass, PlayerId},
    store::{PersistStep, RowCounts, StaticWeaponRegistry},
    EventKind, FinalizeError, IngestConfig, MatchStore, Team,
};
use rstest::rstest;
use utils::{player, six_player_match, MatchScript, TestSetupBuilder, MAP};

#[tokio::test]
async fn five_players_are_rejected_without_writes() {
    let setup = TestSetupBuilder::new().build();
    let sealed = MatchScript::new()
        .map(MAP)
        .round_start()
        .kill(player(1), Team::Red, player(2), "scattergun")
        .kill(player(3), Team::Red, player(4), "scattergun")
        .kill(player(5), Team::Blu, player(1), "scattergun")
        .game_over()
        .build_match()
        .seal();

    let err = setup.finalizer.finalize(&sealed).await.unwrap_err();

    assert!(matches!(
        err,
        FinalizeError::InsufficientPlayers {
            found: 5,
            required: 6
        }
    ));
    assert_eq!(setup.store.row_counts().await, RowCounts::default());
    assert!(setup.store.match_ids().await.is_empty());
    assert_eq!(setup.people.person_count().await, 0);
}

#[tokio::test]
async fn match_without_map_is_incomplete() {
    let setup = TestSetupBuilder::new().build();
    let mut script = MatchScript::new().round_start();
    for n in 1..=6 {
        script = script.spawn(player(n), Team::Red, "scout");
    }

    let err = setup
        .finalizer
        .finalize(&script.build_match().seal())
        .await
        .unwrap_err();

    assert!(matches!(err, FinalizeError::IncompleteMatch));
    assert_eq!(setup.store.row_counts().await.total(), 0);
}

#[rstest]
#[case(499, false)]
#[case(500, true)]
#[case(1200, true)]
#[tokio::test]
async fn healer_row_respects_healing_threshold(#[case] healing: i64, #[case] persisted: bool) {
    let setup = TestSetupBuilder::new().build();
    let sealed = six_player_match(healing).build_match().seal();

    let match_id = setup.finalizer.finalize(&sealed).await.unwrap();

    let stored = setup.store.load_match(match_id).await.unwrap().unwrap();
    let medic = stored.player(PlayerId::new(player(1))).unwrap();
    assert_eq!(medic.medic.is_some(), persisted);
    assert!(medic
        .classes
        .iter()
        .any(|c| c.class == PlayerClass::Medic));
    // the blue medic never healed
    assert!(stored.player(PlayerId::new(player(4))).unwrap().medic.is_none());
}

#[tokio::test]
async fn medic_healing_before_any_class_event_reaches_medic_row() {
    let setup = TestSetupBuilder::new().build();
    let mut script = MatchScript::new().map(MAP).round_start();
    for n in 2..=6 {
        script = script.spawn(player(n), Team::Red, "scout");
    }
    let sealed = script
        .heal(player(1), Team::Red, player(2), 600)
        .with(|at| {
            MatchEvent::new(EventKind::ChargeDeployed, at).with_source(player(1), Team::Red)
        })
        .game_over()
        .build_match()
        .seal();

    let match_id = setup.finalizer.finalize(&sealed).await.unwrap();

    let stored = setup.store.load_match(match_id).await.unwrap().unwrap();
    let medic = stored.player(PlayerId::new(player(1))).unwrap();
    assert_eq!(medic.row.healing, 600);
    assert_eq!(medic.medic.as_ref().map(|m| m.healing), Some(600));
    assert_eq!(medic.medic.as_ref().map(|m| m.charges_uber), Some(1));
    assert!(medic.classes.is_empty());
}

#[tokio::test]
async fn persisted_totals_match_memory() {
    let setup = TestSetupBuilder::new().build();
    let sealed = six_player_match(800).build_match().seal();

    let match_id = setup.finalizer.finalize(&sealed).await.unwrap();
    let stored = setup.store.load_match(match_id).await.unwrap().unwrap();

    assert_eq!(stored.header.map_name, MAP);
    assert_eq!(stored.header.winner, Team::Red);
    assert_eq!(stored.header.correlation_id, sealed.correlation_id);
    assert_eq!(stored.players.len(), 6);

    for aggregate in sealed.valid_players() {
        let row = &stored.player(aggregate.player_id).unwrap().row;
        assert_eq!(row.kills, aggregate.kills);
        assert_eq!(row.deaths, aggregate.deaths);
        assert_eq!(row.damage, aggregate.damage);
        assert_eq!(row.healing, aggregate.healing);
        assert_eq!(row.healing_taken, aggregate.healing_taken);
        assert_eq!(Some(row.time_end), sealed.time_end);
    }

    let soldier = stored.player(PlayerId::new(player(2))).unwrap();
    assert_eq!(soldier.weapons.len(), 1);
    assert_eq!(soldier.weapons[0].kills, 3);
    assert_eq!(soldier.weapons[0].damage, 110);
    assert_eq!(soldier.killstreaks.len(), 1);
    assert_eq!(soldier.killstreaks[0].kills, 3);

    let medic = stored.player(PlayerId::new(player(1))).unwrap().medic.clone().unwrap();
    assert_eq!(medic.healing, 800);
}

#[tokio::test]
async fn unknown_weapon_is_skipped_not_fatal() {
    let setup = TestSetupBuilder::new()
        .with_weapons(StaticWeaponRegistry::with_weapons([("scattergun", 1)]))
        .build();
    let sealed = six_player_match(0).build_match().seal();

    let match_id = setup.finalizer.finalize(&sealed).await.unwrap();

    let stored = setup.store.load_match(match_id).await.unwrap().unwrap();
    assert!(stored.player(PlayerId::new(player(2))).unwrap().weapons.is_empty());
    assert_eq!(stored.player(PlayerId::new(player(3))).unwrap().weapons.len(), 1);
}

#[rstest]
#[case(PersistStep::Begin)]
#[case(PersistStep::Match)]
#[case(PersistStep::Player)]
#[case(PersistStep::Weapon)]
#[case(PersistStep::PlayerClass)]
#[case(PersistStep::Killstreak)]
#[case(PersistStep::Healer)]
#[case(PersistStep::Commit)]
#[tokio::test]
async fn failure_at_any_step_leaves_no_rows(#[case] step: PersistStep) {
    let setup = TestSetupBuilder::new().build();
    setup.store.fail_at(step).await;
    let sealed = six_player_match(900).build_match().seal();

    let err = setup.finalizer.finalize(&sealed).await.unwrap_err();

    assert_eq!(err.failed_step(), Some(step));
    assert!(!err.is_rejection());
    assert_eq!(setup.store.row_counts().await, RowCounts::default());
}

#[tokio::test]
async fn person_store_failure_rolls_back() {
    let setup = TestSetupBuilder::new().build();
    setup.people.reject(PlayerId::new(player(4))).await;
    let sealed = six_player_match(900).build_match().seal();

    let err = setup.finalizer.finalize(&sealed).await.unwrap_err();

    assert!(matches!(err, FinalizeError::Person(_)));
    assert_eq!(setup.store.row_counts().await.total(), 0);
}

#[tokio::test]
async fn finalizing_twice_creates_two_matches() {
    let setup = TestSetupBuilder::new().build();
    let sealed = six_player_match(700).build_match().seal();

    let first = setup.finalizer.finalize(&sealed).await.unwrap();
    let second = setup.finalizer.finalize(&sealed).await.unwrap();

    assert_ne!(first, second);
    let counts = setup.store.row_counts().await;
    assert_eq!(counts.matches, 2);
    assert_eq!(counts.players, 12);
    // identities are shared across matches
    assert_eq!(setup.people.person_count().await, 6);
}

#[tokio::test]
async fn placeholder_players_are_not_persisted() {
    let setup = TestSetupBuilder::new().build();
    let mut game = six_player_match(700).build_match();
    let seen_at = game.time_end().unwrap();
    // the recording host shows up with an unusable id
    game.get_or_create_player(PlayerId::new(0), seen_at);
    let sealed = game.seal();
    assert_eq!(sealed.players.len(), 7);

    let match_id = setup.finalizer.finalize(&sealed).await.unwrap();

    let stored = setup.store.load_match(match_id).await.unwrap().unwrap();
    assert_eq!(stored.players.len(), 6);
}

#[tokio::test]
async fn slow_store_hits_the_deadline_and_rolls_back() {
    let setup = TestSetupBuilder::new()
        .with_config(IngestConfig::default().with_finalize_timeout(Duration::from_millis(50)))
        .with_latency(Duration::from_millis(20))
        .build();
    let sealed = six_player_match(700).build_match().seal();

    let err = setup.finalizer.finalize(&sealed).await.unwrap_err();

    assert!(matches!(err, FinalizeError::Timeout(d) if d == Duration::from_millis(50)));
    assert_eq!(setup.store.row_counts().await.total(), 0);
}

#[tokio::test]
async fn lower_player_minimum_is_honoured() {
    let setup = TestSetupBuilder::new()
        .with_config(IngestConfig::default().with_min_players(2))
        .build();
    let sealed = MatchScript::new()
        .map(MAP)
        .round_start()
        .kill(player(1), Team::Red, player(2), "scattergun")
        .game_over()
        .build_match()
        .seal();

    let match_id = setup.finalizer.finalize(&sealed).await.unwrap();
    let stored = setup.store.load_match(match_id).await.unwrap().unwrap();
    assert_eq!(stored.players.len(), 2);
}
