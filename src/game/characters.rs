//! Character store adapter.
//!
//! Characters have no ids of their own; they live in one of the five slots of
//! an account document. Every mutation loads the account, copies the slot
//! array, changes exactly one slot and writes the whole array back with a
//! merge write that also re-asserts `email`, `createdAt` and `isAdmin`.
//!
//! There is no version check. Two writers racing on the same account lose
//! one of the updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::GameConfig;
use crate::game::accounts::load_account;
use crate::game::catalog;
use crate::game::errors::GameError;
use crate::game::types::{Account, Character, Equipment, Item, ItemKind, SlotIndex, USERS};
use crate::gateway::{to_fields, DocumentStore, SetOptions};
use crate::logutil::{escape_log, short_id};
use crate::validation::validate_display_name;

/// Notice produced when an inventory item is used up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUse {
    pub item: Item,
    pub message: String,
}

impl ItemUse {
    fn new(item: Item) -> Self {
        let announces_effect = matches!(item.kind, ItemKind::RealItem | ItemKind::Penalty)
            || item.effect.is_some();
        let message = if announces_effect && !item.description.is_empty() {
            format!("{} used! {}", item.name, item.description)
        } else {
            format!("{} used!", item.name)
        };
        Self { item, message }
    }
}

/// Body of the whole-array write.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotWrite<'a> {
    email: &'a str,
    created_at: DateTime<Utc>,
    is_admin: bool,
    characters: &'a [Option<Character>],
}

pub struct CharacterStore<S> {
    store: Arc<S>,
    config: GameConfig,
}

impl<S: DocumentStore> CharacterStore<S> {
    pub fn new(store: Arc<S>, config: GameConfig) -> Self {
        Self { store, config }
    }

    /// The five slots of an account, empty ones as `None`.
    pub async fn list_characters(
        &self,
        account_id: &str,
    ) -> Result<Vec<Option<Character>>, GameError> {
        Ok(load_account(self.store.as_ref(), account_id).await?.characters)
    }

    pub async fn load_character(
        &self,
        account_id: &str,
        slot: SlotIndex,
    ) -> Result<Character, GameError> {
        let account = load_account(self.store.as_ref(), account_id).await?;
        account
            .character(slot)
            .cloned()
            .ok_or_else(|| empty_slot(slot))
    }

    /// Create a character in `slot`. An occupied slot is overwritten.
    pub async fn create_character(
        &self,
        account_id: &str,
        slot: SlotIndex,
        name: &str,
        class_key: &str,
    ) -> Result<Character, GameError> {
        let name = validate_display_name("character name", name, self.config.max_name_len)?;
        let class = catalog::class(class_key)?;

        let hat = catalog::starter_hat();
        let character = Character {
            name,
            class_ref: class.key.to_string(),
            hat: hat.clone(),
            xp: 0,
            coins: self.config.starting_coins,
            level: 1,
            inventory: Vec::new(),
            equipped: Equipment {
                hat: Some(hat),
                ..Equipment::default()
            },
            stats: class.base_stats,
            created_at: Utc::now(),
        };

        let created = self
            .mutate_slot(account_id, slot, "create character", |entry| {
                if entry.is_some() {
                    debug!("slot {} of {} is being overwritten", slot, short_id(account_id));
                }
                *entry = Some(character.clone());
                Ok(character)
            })
            .await?;
        info!(
            "created {} '{}' in slot {} of {}",
            created.class_ref,
            escape_log(&created.name),
            slot,
            short_id(account_id)
        );
        Ok(created)
    }

    /// Empty `slot`. Emptying an already empty slot succeeds.
    pub async fn delete_character(&self, account_id: &str, slot: SlotIndex) -> Result<(), GameError> {
        self.mutate_slot(account_id, slot, "delete character", |entry| {
            *entry = None;
            Ok(())
        })
        .await?;
        info!("emptied slot {} of {}", slot, short_id(account_id));
        Ok(())
    }

    /// Add `delta` (possibly negative) to the character's xp. No clamping.
    pub async fn grant_experience(
        &self,
        account_id: &str,
        slot: SlotIndex,
        delta: i64,
    ) -> Result<Character, GameError> {
        self.update_character(account_id, slot, "grant experience", |character| {
            character.xp = character.xp.saturating_add(delta);
            Ok(())
        })
        .await
    }

    /// Pay for `item` and append it to the inventory. Duplicates are allowed.
    pub async fn purchase_item(
        &self,
        account_id: &str,
        slot: SlotIndex,
        item: &Item,
    ) -> Result<Character, GameError> {
        self.update_character(account_id, slot, "purchase item", |character| {
            if character.coins < item.price {
                return Err(GameError::InsufficientFunds {
                    needed: item.price,
                    available: character.coins,
                });
            }
            character.coins -= item.price;
            character.inventory.push(item.clone());
            Ok(())
        })
        .await
    }

    /// Put `item` into the equipment slot matching its kind. The item does
    /// not have to be owned and stays in the inventory if it is.
    pub async fn equip_item(
        &self,
        account_id: &str,
        slot: SlotIndex,
        item: &Item,
    ) -> Result<Character, GameError> {
        let equipment_slot = item.kind.equipment_slot().ok_or_else(|| {
            GameError::Validation(format!("{} cannot be equipped", item.name))
        })?;
        self.update_character(account_id, slot, "equip item", |character| {
            if item.kind == ItemKind::Hat {
                character.hat = item.clone();
            }
            character.equipped.set(equipment_slot, item.clone());
            Ok(())
        })
        .await
    }

    /// Remove the inventory entry at `index`; later entries shift down.
    pub async fn consume_item(
        &self,
        account_id: &str,
        slot: SlotIndex,
        index: usize,
    ) -> Result<ItemUse, GameError> {
        self.mutate_character(account_id, slot, "consume item", |character| {
            if index >= character.inventory.len() {
                return Err(GameError::not_found(format!("inventory item {}", index)));
            }
            Ok(ItemUse::new(character.inventory.remove(index)))
        })
        .await
    }

    /// Credit the xp and coins of a catalogued party game in one write.
    pub async fn award_game(
        &self,
        account_id: &str,
        slot: SlotIndex,
        game_id: &str,
    ) -> Result<Character, GameError> {
        let game = catalog::party_game(game_id)?;
        let character = self
            .update_character(account_id, slot, "award game", |character| {
                character.xp = character.xp.saturating_add(game.xp_reward);
                character.coins = character.coins.saturating_add(game.coin_reward);
                Ok(())
            })
            .await?;
        info!(
            "{} awarded {} xp / {} coins for {}",
            escape_log(&character.name),
            game.xp_reward,
            game.coin_reward,
            game.name
        );
        Ok(character)
    }

    /// Mutate an occupied slot and return the character as written.
    async fn update_character(
        &self,
        account_id: &str,
        slot: SlotIndex,
        op: &str,
        f: impl FnOnce(&mut Character) -> Result<(), GameError>,
    ) -> Result<Character, GameError> {
        self.mutate_character(account_id, slot, op, |character| {
            f(character)?;
            character.sync_level();
            Ok(character.clone())
        })
        .await
    }

    async fn mutate_character<T>(
        &self,
        account_id: &str,
        slot: SlotIndex,
        op: &str,
        f: impl FnOnce(&mut Character) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        self.mutate_slot(account_id, slot, op, |entry| match entry.as_mut() {
            Some(character) => f(character),
            None => Err(empty_slot(slot)),
        })
        .await
    }

    async fn mutate_slot<T>(
        &self,
        account_id: &str,
        slot: SlotIndex,
        op: &str,
        f: impl FnOnce(&mut Option<Character>) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let result = self.try_mutate_slot(account_id, slot, f).await;
        if let Err(e) = &result {
            warn!(
                "{} failed for slot {} of {}: {}",
                op,
                slot,
                short_id(account_id),
                e
            );
        }
        result
    }

    async fn try_mutate_slot<T>(
        &self,
        account_id: &str,
        slot: SlotIndex,
        f: impl FnOnce(&mut Option<Character>) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let account = load_account(self.store.as_ref(), account_id).await?;
        let mut characters = account.characters.clone();
        let out = f(&mut characters[slot.index()])?;
        if let Some(character) = characters[slot.index()].as_mut() {
            character.sync_level();
        }
        self.write_slots(account_id, &account, &characters).await?;
        Ok(out)
    }

    async fn write_slots(
        &self,
        account_id: &str,
        account: &Account,
        characters: &[Option<Character>],
    ) -> Result<(), GameError> {
        let body = SlotWrite {
            email: &account.email,
            created_at: account.created_at,
            is_admin: account.is_admin,
            characters,
        };
        self.store
            .set(USERS, account_id, to_fields(&body)?, SetOptions::merge())
            .await?;
        Ok(())
    }
}

fn empty_slot(slot: SlotIndex) -> GameError {
    GameError::not_found(format!("character in slot {}", slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryStore;

    async fn seeded() -> (Arc<MemoryStore>, CharacterStore<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new("grog@tavern.example", false);
        store
            .set(USERS, "acct", to_fields(&account).expect("fields"), SetOptions::replace())
            .await
            .expect("seed");
        let chars = CharacterStore::new(store.clone(), GameConfig::default());
        (store, chars)
    }

    fn slot(i: usize) -> SlotIndex {
        SlotIndex::new(i).expect("slot")
    }

    #[tokio::test]
    async fn new_character_starts_with_class_stats_and_viking_hat() {
        let (_, chars) = seeded().await;
        let c = chars
            .create_character("acct", slot(0), "  Grog ", "MAGE")
            .await
            .expect("create");
        assert_eq!(c.name, "Grog");
        assert_eq!(c.class_ref, "mage");
        assert_eq!(c.coins, 100);
        assert_eq!(c.xp, 0);
        assert_eq!(c.hat.id, "viking");
        assert_eq!(c.equipped.hat.as_ref().map(|h| h.id.as_str()), Some("viking"));
        assert_eq!(c.stats, catalog::class("mage").expect("class").base_stats);
    }

    #[tokio::test]
    async fn unknown_class_is_rejected_without_writing() {
        let (store, chars) = seeded().await;
        let writes = store.write_count();
        let err = chars
            .create_character("acct", slot(1), "Grog", "bard")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn stored_level_follows_xp() {
        let (_, chars) = seeded().await;
        chars
            .create_character("acct", slot(0), "Grog", "barbarian")
            .await
            .expect("create");
        let c = chars.grant_experience("acct", slot(0), 250).await.expect("grant");
        assert_eq!(c.level, 3);
        let c = chars.grant_experience("acct", slot(0), -200).await.expect("revoke");
        assert_eq!(c.xp, 50);
        assert_eq!(c.level, 1);
    }

    #[tokio::test]
    async fn operations_on_empty_slot_are_not_found() {
        let (_, chars) = seeded().await;
        let err = chars.grant_experience("acct", slot(2), 10).await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
        let err = chars.load_character("acct", slot(2)).await.unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    #[tokio::test]
    async fn consumables_cannot_be_equipped() {
        let (_, chars) = seeded().await;
        chars
            .create_character("acct", slot(0), "Grog", "paladin")
            .await
            .expect("create");
        let straw = catalog::shop_item("straw").expect("item");
        let err = chars.equip_item("acct", slot(0), &straw).await.unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
    }

    #[test]
    fn item_use_message_includes_description_for_effects() {
        let salt = catalog::shop_item("salt").expect("item");
        assert_eq!(ItemUse::new(salt).message, "Salt used! Make a drink salty");
        let hat = catalog::hat_by_id("party").expect("hat");
        assert_eq!(ItemUse::new(hat).message, "Party Hat used!");
    }
}
