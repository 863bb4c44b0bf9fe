//! # Game Core
//!
//! Everything between the persistence gateway and the presentation layer:
//!
//! - [`types`] - Account, Character, Room and Player records
//! - [`progression`] - xp to level arithmetic
//! - [`catalog`] - classes, hats, shop stock, party games, world levels
//! - [`accounts`] - account documents and role resolution
//! - [`characters`] - slot-level character mutations
//! - [`rooms`] - room sessions and the live roster
//! - [`admin`] - admin panel operations
//! - [`navigation`] - route targets and their URL form

pub mod accounts;
pub mod admin;
pub mod catalog;
pub mod characters;
pub mod errors;
pub mod navigation;
pub mod progression;
pub mod rooms;
pub mod types;

pub use accounts::{AccessError, AccountService, AuthSession, Role};
pub use admin::{AdminConsole, PlayerSummary, RoomWatch};
pub use characters::{CharacterStore, ItemUse};
pub use errors::GameError;
pub use navigation::Route;
pub use rooms::{RoomSession, SessionEvent, SessionState};
pub use types::{
    Account, Character, Equipment, EquipmentSlot, Item, ItemKind, Player, Room, RoomCode,
    SlotIndex, Stats,
};
