//! Admin panel operations: player listing, xp grants, world levels, rooms.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{next_event, player_session, seed_account, seed_player, slot};
use tavernrpg::config::GameConfig;
use tavernrpg::game::accounts::promote_admin;
use tavernrpg::game::{AdminConsole, AuthSession, GameError, Role, SessionEvent};
use tavernrpg::gateway::MemoryStore;
use tokio_test::{assert_err, assert_ok};

async fn open_console(store: &Arc<MemoryStore>) -> (AuthSession, AdminConsole<MemoryStore>) {
    let admin = seed_account(store.as_ref(), "boss", Role::Admin).await;
    let console = AdminConsole::new(store.clone(), admin.clone(), GameConfig::default())
        .map_err(|e| e.to_string())
        .expect("console");
    (admin, console)
}

#[tokio::test]
async fn lists_only_accounts_with_characters() {
    let store = Arc::new(MemoryStore::new());
    let (_, console) = open_console(&store).await;
    seed_player(&store, "alice").await;
    seed_account(store.as_ref(), "lurker", Role::Player).await;

    let players = assert_ok!(console.list_players().await);
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].account_id, "alice");
    assert_eq!(players[0].characters.len(), 1);
    assert_eq!(players[0].total_xp, 0);
}

#[tokio::test]
async fn grants_add_and_remove_within_range() {
    let store = Arc::new(MemoryStore::new());
    let (_, console) = open_console(&store).await;
    seed_player(&store, "alice").await;

    let c = assert_ok!(console.grant_experience("alice", slot(0), 1000).await);
    assert_eq!(c.xp, 1000);
    assert_eq!(c.level(), 11);
    let c = assert_ok!(console.grant_experience("alice", slot(0), -250).await);
    assert_eq!(c.xp, 750);

    assert_err!(console.grant_experience("alice", slot(0), 1001).await);
    assert_err!(console.grant_experience("alice", slot(0), 0).await);

    let players = assert_ok!(console.list_players().await);
    assert_eq!(players[0].total_xp, 750);
}

#[tokio::test]
async fn custom_grant_range_from_config() {
    let store = Arc::new(MemoryStore::new());
    let admin = seed_account(store.as_ref(), "boss", Role::Admin).await;
    let config = GameConfig {
        xp_grant_min: 10,
        xp_grant_max: 50,
        ..GameConfig::default()
    };
    let console = AdminConsole::new(store.clone(), admin, config)
        .map_err(|e| e.to_string())
        .expect("console");
    seed_player(&store, "alice").await;
    assert!(matches!(
        console.grant_experience("alice", slot(0), 5).await,
        Err(GameError::Validation(_))
    ));
    assert_ok!(console.grant_experience("alice", slot(0), -50).await);
}

#[tokio::test]
async fn world_level_change_reaches_the_player_session() {
    let store = Arc::new(MemoryStore::new());
    let (_, console) = open_console(&store).await;
    let mut host = player_session(&store, "host").await;
    let room_id = assert_ok!(host.create_room("Party").await).id.clone();

    let room = assert_ok!(console.set_world_level(&room_id, "host", 3).await);
    assert_eq!(room.player("host").map(|p| p.world_level), Some(3));

    match next_event(&mut host).await {
        SessionEvent::RosterChanged(room) => {
            assert_eq!(room.players[0].world_level, 3);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(host.world_level(), Some(3));
    let route = assert_ok!(host.advance_to_world_level(3));
    assert_eq!(route.to_path(), format!("/game/0?worldLevel=3&roomId={}", room_id));

    assert!(matches!(
        console.set_world_level(&room_id, "stranger", 2).await,
        Err(GameError::NotFound(_))
    ));
}

#[tokio::test]
async fn room_watch_tracks_creation_and_deletion() {
    let store = Arc::new(MemoryStore::new());
    let (_, console) = open_console(&store).await;
    let mut watch = assert_ok!(console.watch_rooms().await);
    assert!(watch.snapshot().is_empty());

    let mut host = player_session(&store, "host").await;
    let room_id = assert_ok!(host.create_room("Party").await).id.clone();

    let listing = tokio::time::timeout(Duration::from_secs(2), watch.next())
        .await
        .expect("in time")
        .expect("open");
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].id, room_id);

    assert_ok!(console.delete_room(&room_id).await);
    let listing = tokio::time::timeout(Duration::from_secs(2), watch.next())
        .await
        .expect("in time")
        .expect("open");
    assert!(listing.is_empty());
    assert!(assert_ok!(console.list_rooms().await).is_empty());
}

#[tokio::test]
async fn promote_by_admin_sets_stored_flag() {
    let store = Arc::new(MemoryStore::new());
    let (admin, console) = open_console(&store).await;
    seed_player(&store, "alice").await;
    assert_ok!(promote_admin(store.as_ref(), &admin, "alice").await);
    let players = assert_ok!(console.list_players().await);
    assert!(players.iter().any(|p| p.account_id == "alice" && p.is_admin));
}
