use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::errors::GameError;
use crate::game::progression::level_for_xp;
use crate::gateway::{to_fields, Document, Fields, StoreError};
use crate::validation::{normalize_room_code, InputError, ROOM_CODE_LEN};

/// Collection holding one document per account.
pub const USERS: &str = "users";
/// Collection holding one document per active room.
pub const ROOMS: &str = "rooms";

/// Fixed number of character slots per account.
pub const CHARACTER_SLOTS: usize = 5;

/// World level every player starts at when entering a room.
pub const STARTING_WORLD_LEVEL: u32 = 1;

/// Position of a character within an account, `0..CHARACTER_SLOTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub fn new(index: usize) -> Result<Self, GameError> {
        if index >= CHARACTER_SLOTS {
            return Err(GameError::Validation(format!(
                "slot {} out of range (0-{})",
                index,
                CHARACTER_SLOTS - 1
            )));
        }
        Ok(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..CHARACTER_SLOTS as u8).map(SlotIndex)
    }
}

impl TryFrom<u8> for SlotIndex {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SlotIndex::new(value as usize)
    }
}

impl From<SlotIndex> for u8 {
    fn from(slot: SlotIndex) -> Self {
        slot.0
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Four upper-case ASCII letters identifying a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parse user input; lower-case letters are accepted and upper-cased.
    pub fn parse(input: &str) -> Result<Self, InputError> {
        normalize_room_code(input).map(RoomCode)
    }

    /// Four letters drawn uniformly from A-Z. Not unique by itself; callers
    /// check the code against existing rooms.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..ROOM_CODE_LEN)
            .map(|_| char::from(b'A' + rng.gen_range(0..26u8)))
            .collect();
        RoomCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoomCode::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub alcohol_tolerance: i32,
    #[serde(default)]
    pub stomach_capacity: i32,
    #[serde(default)]
    pub energy: i32,
}

impl Stats {
    pub const fn new(alcohol_tolerance: i32, stomach_capacity: i32, energy: i32) -> Self {
        Self {
            alcohol_tolerance,
            stomach_capacity,
            energy,
        }
    }

    pub fn plus(self, other: Stats) -> Stats {
        Stats {
            alcohol_tolerance: self.alcohol_tolerance + other.alcohol_tolerance,
            stomach_capacity: self.stomach_capacity + other.stomach_capacity,
            energy: self.energy + other.energy,
        }
    }
}

/// Equipment positions on a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    Hat,
    Armor,
    Boots,
    Gloves,
    Accessory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Hat,
    Armor,
    Boots,
    Gloves,
    Accessory,
    /// Redeemable for a real-world object at the table.
    RealItem,
    /// Used on another player's drink.
    Penalty,
}

impl ItemKind {
    /// Slot the item goes into when equipped, `None` for consumables.
    pub fn equipment_slot(self) -> Option<EquipmentSlot> {
        match self {
            ItemKind::Hat => Some(EquipmentSlot::Hat),
            ItemKind::Armor => Some(EquipmentSlot::Armor),
            ItemKind::Boots => Some(EquipmentSlot::Boots),
            ItemKind::Gloves => Some(EquipmentSlot::Gloves),
            ItemKind::Accessory => Some(EquipmentSlot::Accessory),
            ItemKind::RealItem | ItemKind::Penalty => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub price: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    /// Effect tag, e.g. `double_xp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
}

impl Item {
    pub fn new(id: &str, name: &str, kind: ItemKind, price: i64) -> Result<Self, GameError> {
        if id.trim().is_empty() || name.trim().is_empty() {
            return Err(GameError::Validation("item needs an id and a name".to_string()));
        }
        if price < 0 {
            return Err(GameError::Validation(format!(
                "item {} has a negative price",
                id
            )));
        }
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            price,
            description: String::new(),
            stats: None,
            effect: None,
            sprite: None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(default)]
    pub hat: Option<Item>,
    #[serde(default)]
    pub armor: Option<Item>,
    #[serde(default)]
    pub boots: Option<Item>,
    #[serde(default)]
    pub gloves: Option<Item>,
    #[serde(default)]
    pub accessory: Option<Item>,
}

impl Equipment {
    pub fn get(&self, slot: EquipmentSlot) -> Option<&Item> {
        match slot {
            EquipmentSlot::Hat => self.hat.as_ref(),
            EquipmentSlot::Armor => self.armor.as_ref(),
            EquipmentSlot::Boots => self.boots.as_ref(),
            EquipmentSlot::Gloves => self.gloves.as_ref(),
            EquipmentSlot::Accessory => self.accessory.as_ref(),
        }
    }

    pub fn set(&mut self, slot: EquipmentSlot, item: Item) {
        let target = match slot {
            EquipmentSlot::Hat => &mut self.hat,
            EquipmentSlot::Armor => &mut self.armor,
            EquipmentSlot::Boots => &mut self.boots,
            EquipmentSlot::Gloves => &mut self.gloves,
            EquipmentSlot::Accessory => &mut self.accessory,
        };
        *target = Some(item);
    }

    /// Sum of the stat bonuses of everything equipped.
    pub fn bonus(&self) -> Stats {
        [
            &self.hat,
            &self.armor,
            &self.boots,
            &self.gloves,
            &self.accessory,
        ]
        .into_iter()
        .flatten()
        .filter_map(|item| item.stats)
        .fold(Stats::default(), Stats::plus)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub name: String,
    /// Catalogue key of the character class.
    pub class_ref: String,
    pub hat: Item,
    pub xp: i64,
    pub coins: i64,
    /// Denormalized copy of [`Character::level`], rewritten on every save.
    #[serde(default = "default_level")]
    pub level: i64,
    #[serde(default)]
    pub inventory: Vec<Item>,
    #[serde(default)]
    pub equipped: Equipment,
    pub stats: Stats,
    pub created_at: DateTime<Utc>,
}

fn default_level() -> i64 {
    1
}

impl Character {
    /// Level derived from xp. The stored `level` field is never consulted.
    pub fn level(&self) -> i64 {
        level_for_xp(self.xp)
    }

    /// Bring the denormalized level in line with xp before persisting.
    pub fn sync_level(&mut self) {
        self.level = self.level();
    }

    /// Base stats plus equipment bonuses.
    pub fn effective_stats(&self) -> Stats {
        self.stats.plus(self.equipped.bonus())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub email: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub characters: Vec<Option<Character>>,
}

impl Account {
    pub fn new(email: &str, is_admin: bool) -> Self {
        Self {
            email: email.to_string(),
            created_at: Utc::now(),
            is_admin,
            characters: vec![None; CHARACTER_SLOTS],
        }
    }

    /// Decode an account document, padding or trimming the slot array to
    /// exactly [`CHARACTER_SLOTS`] entries.
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let mut account: Account = doc.decode(USERS)?;
        account.characters.resize(CHARACTER_SLOTS, None);
        Ok(account)
    }

    pub fn character(&self, slot: SlotIndex) -> Option<&Character> {
        self.characters.get(slot.index()).and_then(Option::as_ref)
    }

    pub fn occupied_slots(&self) -> impl Iterator<Item = (SlotIndex, &Character)> {
        SlotIndex::all().filter_map(move |slot| self.character(slot).map(|c| (slot, c)))
    }

    pub fn total_xp(&self) -> i64 {
        self.occupied_slots().map(|(_, c)| c.xp).sum()
    }
}

/// Roster entry. `character` is a copy taken when the player joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub uid: String,
    pub character_slot: SlotIndex,
    pub character: Character,
    pub world_level: u32,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn new(uid: &str, character_slot: SlotIndex, character: Character) -> Self {
        Self {
            uid: uid.to_string(),
            character_slot,
            character,
            world_level: STARTING_WORLD_LEVEL,
            joined_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Document id; not part of the stored body.
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub code: RoomCode,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl Room {
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let mut room: Room = doc.decode(ROOMS)?;
        room.id = doc.id.clone();
        Ok(room)
    }

    pub fn to_fields(&self) -> Result<Fields, StoreError> {
        to_fields(self)
    }

    pub fn player(&self, uid: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.uid == uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.player(uid).is_some()
    }
}
