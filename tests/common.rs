//! Test utilities & fixtures shared by the integration tests.

use std::sync::Arc;
use std::time::Duration;

use tavernrpg::config::GameConfig;
use tavernrpg::game::types::{Account, USERS};
use tavernrpg::game::{AuthSession, Character, CharacterStore, Role, RoomSession, SessionEvent, SlotIndex};
use tavernrpg::gateway::{to_fields, DocumentStore, MemoryStore, SetOptions};

#[allow(dead_code)]
pub fn slot(index: usize) -> SlotIndex {
    SlotIndex::new(index).expect("slot")
}

/// Write an empty account document and return a session for it.
#[allow(dead_code)]
pub async fn seed_account<S: DocumentStore>(store: &S, uid: &str, role: Role) -> AuthSession {
    let email = format!("{}@tavern.example", uid);
    let account = Account::new(&email, role == Role::Admin);
    store
        .set(USERS, uid, to_fields(&account).expect("fields"), SetOptions::replace())
        .await
        .expect("seed account");
    AuthSession {
        account_id: uid.to_string(),
        email,
        role,
    }
}

/// Account with a mage in slot 0.
#[allow(dead_code)]
pub async fn seed_player(store: &Arc<MemoryStore>, uid: &str) -> (AuthSession, Character) {
    let session = seed_account(store.as_ref(), uid, Role::Player).await;
    let character = CharacterStore::new(store.clone(), GameConfig::default())
        .create_character(uid, slot(0), &format!("{}-hero", uid), "mage")
        .await
        .expect("create character");
    (session, character)
}

/// Open a room session for the slot-0 character of a freshly seeded player.
#[allow(dead_code)]
pub async fn player_session(store: &Arc<MemoryStore>, uid: &str) -> RoomSession<MemoryStore> {
    let (session, _) = seed_player(store, uid).await;
    RoomSession::open(store.clone(), session, slot(0))
        .await
        .map_err(|e| e.to_string())
        .expect("open session")
}

/// Next session event, failing the test instead of hanging.
#[allow(dead_code)]
pub async fn next_event<S: DocumentStore>(session: &mut RoomSession<S>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), session.next_event())
        .await
        .expect("event within timeout")
        .expect("subscription open")
}
