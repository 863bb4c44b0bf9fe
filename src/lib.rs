//! # Tavern RPG - party game core
//!
//! Tavern RPG is the shared core of a drinking-party role-playing game. Players
//! sign in, keep up to five characters per account, gather in rooms joined by
//! a four-letter code and are moved through numbered world-level challenges
//! by an admin.
//!
//! ## Features
//!
//! - **Characters**: five fixed slots per account, classes with base stats,
//!   xp-driven levels, coins, inventory and equipment.
//! - **Rooms**: unique four-letter codes, idempotent joins, live roster
//!   updates and automatic deletion when the last player leaves.
//! - **Admin Panel**: xp grants, party-game rewards, world-level moves and
//!   room cleanup, gated by a role resolved once at sign-in.
//! - **Storage**: a small document-store trait with an on-disk sled backend
//!   and an in-memory backend for tests.
//! - **Security**: Argon2id password hashing and lockout after repeated
//!   failed sign-ins.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tavernrpg::config::Config;
//! use tavernrpg::game::{CharacterStore, SlotIndex};
//! use tavernrpg::gateway::SledStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("tavern.toml").await?;
//!     let store = Arc::new(SledStore::open(config.storage.database_path())?);
//!     let characters = CharacterStore::new(store, config.game.clone());
//!     for (slot, character) in characters.list_characters("some-account").await?.iter().enumerate() {
//!         if let Some(c) = character {
//!             println!("{}: {} (level {})", slot, c.name, c.level());
//!         }
//!     }
//!     let _ = SlotIndex::new(0)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - characters, rooms, accounts, admin operations, catalogue
//! - [`gateway`] - document store abstraction and backends
//! - [`identity`] - email/password authentication
//! - [`config`] - configuration management and validation
//! - [`validation`] - input validation helpers
//! - [`logutil`] - log-safe rendering of user strings

pub mod config;
pub mod game;
pub mod gateway;
pub mod identity;
pub mod logutil;
pub mod validation;
