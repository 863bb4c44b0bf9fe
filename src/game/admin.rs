//! Admin panel operations.
//!
//! An [`AdminConsole`] can only be built from an admin [`AuthSession`]; every
//! operation on it therefore runs with the admin role. Grants and world-level
//! changes are recorded on the `security` log target.

use std::sync::Arc;

use log::{info, warn};

use crate::config::GameConfig;
use crate::game::accounts::{list_accounts, AuthSession};
use crate::game::characters::CharacterStore;
use crate::game::errors::GameError;
use crate::game::types::{Character, Room, SlotIndex, ROOMS};
use crate::gateway::{CollectionSubscription, Document, DocumentStore, Fields, StoreError};
use crate::logutil::short_id;

/// One account as listed in the admin panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSummary {
    pub account_id: String,
    pub email: String,
    pub is_admin: bool,
    pub characters: Vec<(SlotIndex, Character)>,
    pub total_xp: i64,
}

/// Live listing of every room.
pub struct RoomWatch {
    inner: CollectionSubscription,
}

impl RoomWatch {
    pub fn snapshot(&self) -> Vec<Room> {
        decode_rooms(self.inner.snapshot())
    }

    /// Wait for the next change and return the full listing.
    pub async fn next(&mut self) -> Option<Vec<Room>> {
        self.inner.next().await.map(decode_rooms)
    }
}

fn decode_rooms(docs: Vec<Document>) -> Vec<Room> {
    docs.iter()
        .filter_map(|doc| match Room::from_document(doc) {
            Ok(room) => Some(room),
            Err(e) => {
                warn!("skipping unreadable room {}: {}", short_id(&doc.id), e);
                None
            }
        })
        .collect()
}

pub struct AdminConsole<S> {
    store: Arc<S>,
    characters: CharacterStore<S>,
    actor: AuthSession,
    config: GameConfig,
}

impl<S: DocumentStore> AdminConsole<S> {
    pub fn new(store: Arc<S>, actor: AuthSession, config: GameConfig) -> Result<Self, GameError> {
        actor.require_admin("open admin panel")?;
        Ok(Self {
            characters: CharacterStore::new(store.clone(), config.clone()),
            store,
            actor,
            config,
        })
    }

    /// Accounts that own at least one character.
    pub async fn list_players(&self) -> Result<Vec<PlayerSummary>, GameError> {
        let accounts = list_accounts(self.store.as_ref()).await?;
        Ok(accounts
            .into_iter()
            .filter_map(|(account_id, account)| {
                let characters: Vec<(SlotIndex, Character)> = account
                    .occupied_slots()
                    .map(|(slot, c)| (slot, c.clone()))
                    .collect();
                if characters.is_empty() {
                    return None;
                }
                Some(PlayerSummary {
                    total_xp: account.total_xp(),
                    account_id,
                    email: account.email,
                    is_admin: account.is_admin,
                    characters,
                })
            })
            .collect())
    }

    /// Add (positive `amount`) or remove (negative `amount`) xp. The
    /// magnitude must lie within the configured grant range.
    pub async fn grant_experience(
        &self,
        account_id: &str,
        slot: SlotIndex,
        amount: i64,
    ) -> Result<Character, GameError> {
        let magnitude = amount.unsigned_abs();
        let (min, max) = (self.config.xp_grant_min, self.config.xp_grant_max);
        if magnitude < min.unsigned_abs() || magnitude > max.unsigned_abs() {
            return Err(GameError::Validation(format!(
                "amount must be between {} and {}",
                min, max
            )));
        }
        let character = self
            .characters
            .grant_experience(account_id, slot, amount)
            .await?;
        info!(
            target: "security",
            "{} granted {:+} xp to {} slot {} (now {})",
            short_id(&self.actor.account_id),
            amount,
            short_id(account_id),
            slot,
            character.xp
        );
        Ok(character)
    }

    /// Credit a party game's rewards to a character.
    pub async fn award_game(
        &self,
        account_id: &str,
        slot: SlotIndex,
        game_id: &str,
    ) -> Result<Character, GameError> {
        let character = self.characters.award_game(account_id, slot, game_id).await?;
        info!(
            target: "security",
            "{} awarded {} to {} slot {}",
            short_id(&self.actor.account_id),
            game_id,
            short_id(account_id),
            slot
        );
        Ok(character)
    }

    /// Move a player in a room to another world level.
    pub async fn set_world_level(
        &self,
        room_id: &str,
        uid: &str,
        level: u32,
    ) -> Result<Room, GameError> {
        if level == 0 {
            return Err(GameError::Validation("world levels start at 1".to_string()));
        }
        let doc = self
            .store
            .get(ROOMS, room_id)
            .await?
            .ok_or_else(|| GameError::not_found(format!("room {}", short_id(room_id))))?;
        let mut room = Room::from_document(&doc)?;
        let player = room
            .players
            .iter_mut()
            .find(|p| p.uid == uid)
            .ok_or_else(|| GameError::not_found(format!("player {} in room {}", short_id(uid), room.code)))?;
        player.world_level = level;

        let mut fields = Fields::new();
        fields.insert(
            "players".to_string(),
            serde_json::to_value(&room.players).map_err(StoreError::from)?,
        );
        self.store.update(ROOMS, room_id, fields).await.map_err(|e| match e {
            StoreError::MissingDocument { .. } => {
                GameError::not_found(format!("room {}", short_id(room_id)))
            }
            other => {
                warn!("set world level failed: {}", other);
                GameError::Transport(other)
            }
        })?;
        info!(
            target: "security",
            "{} moved {} to world level {} in room {}",
            short_id(&self.actor.account_id),
            short_id(uid),
            level,
            room.code
        );
        Ok(room)
    }

    /// Delete a room outright. Deleting a missing room succeeds.
    pub async fn delete_room(&self, room_id: &str) -> Result<(), GameError> {
        self.store.delete(ROOMS, room_id).await?;
        info!(
            target: "security",
            "{} deleted room {}",
            short_id(&self.actor.account_id),
            short_id(room_id)
        );
        Ok(())
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, GameError> {
        Ok(decode_rooms(self.store.list(ROOMS).await?))
    }

    pub async fn watch_rooms(&self) -> Result<RoomWatch, GameError> {
        Ok(RoomWatch {
            inner: self.store.subscribe_collection(ROOMS).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::accounts::Role;
    use crate::gateway::MemoryStore;

    fn session(role: Role) -> AuthSession {
        AuthSession {
            account_id: "admin".to_string(),
            email: "admin@tavern.example".to_string(),
            role,
        }
    }

    #[test]
    fn players_cannot_open_the_console() {
        let store = Arc::new(MemoryStore::new());
        let err = AdminConsole::new(store, session(Role::Player), GameConfig::default())
            .err()
            .expect("denied");
        assert!(matches!(err, GameError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn grant_range_is_checked_before_any_read() {
        let store = Arc::new(MemoryStore::new());
        let console = AdminConsole::new(store.clone(), session(Role::Admin), GameConfig::default())
            .expect("console");
        store.set_offline(true);
        let slot = SlotIndex::new(0).expect("slot");
        for amount in [0, 1001, -1001] {
            assert!(matches!(
                console.grant_experience("acct", slot, amount).await,
                Err(GameError::Validation(_))
            ));
        }
        assert!(matches!(
            console.grant_experience("acct", slot, -5).await,
            Err(GameError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn world_level_zero_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let console = AdminConsole::new(store, session(Role::Admin), GameConfig::default())
            .expect("console");
        assert!(matches!(
            console.set_world_level("room", "uid", 0).await,
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            console.set_world_level("room", "uid", 2).await,
            Err(GameError::NotFound(_))
        ));
    }
}
