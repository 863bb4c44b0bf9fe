//! # Configuration Management Module
//!
//! Static settings for the game core and its backend connection, loaded from
//! a TOML file.
//!
//! ## Configuration Structure
//!
//! - [`GameConfig`] - Game rules (starting coins, name limits, admin roster)
//! - [`StorageConfig`] - Where the document database lives
//! - [`AuthConfig`] - Password policy, lockout and hashing cost
//! - [`LoggingConfig`] - Logging and debugging settings
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tavernrpg::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("tavern.toml").await?;
//!     println!("Game: {}", config.game.name);
//!     Config::create_default("tavern.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [game]
//! name = "The Tipsy Tavern"
//! starting_coins = 100
//! max_name_len = 20
//! admin_emails = ["host@tavern.example"]
//!
//! [storage]
//! data_dir = "./data"
//!
//! [auth]
//! min_password_len = 6
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::validation::email_key;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub name: String,
    /// Coins a freshly created character starts with.
    #[serde(default = "default_starting_coins")]
    pub starting_coins: i64,
    /// Maximum length of character and room names.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
    /// Accounts signing in with one of these emails get the admin role.
    #[serde(default)]
    pub admin_emails: Vec<String>,
    /// Smallest xp amount the admin panel grants or revokes in one step.
    #[serde(default = "default_xp_grant_min")]
    pub xp_grant_min: i64,
    /// Largest xp amount the admin panel grants or revokes in one step.
    #[serde(default = "default_xp_grant_max")]
    pub xp_grant_max: i64,
}

fn default_starting_coins() -> i64 {
    100
}

fn default_max_name_len() -> usize {
    20
}

fn default_xp_grant_min() -> i64 {
    1
}

fn default_xp_grant_max() -> i64 {
    1000
}

impl GameConfig {
    /// Whether `email` is on the configured admin roster.
    pub fn is_admin_email(&self, email: &str) -> bool {
        let key = email_key(email);
        self.admin_emails.iter().any(|e| email_key(e) == key)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            name: "The Tipsy Tavern".to_string(),
            starting_coins: default_starting_coins(),
            max_name_len: default_max_name_len(),
            admin_emails: Vec::new(),
            xp_grant_min: default_xp_grant_min(),
            xp_grant_max: default_xp_grant_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Optional override for the sled database path; defaults to `<data_dir>/tavern.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.data_dir).join("tavern.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
    /// Consecutive failed sign-ins before the email is locked out.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    #[serde(default = "default_lockout_seconds")]
    pub lockout_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argon2: Option<Argon2Config>,
}

fn default_min_password_len() -> usize {
    6
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_lockout_seconds() -> i64 {
    300
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_len: default_min_password_len(),
            max_failed_attempts: default_max_failed_attempts(),
            lockout_seconds: default_lockout_seconds(),
            argon2: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub game: GameConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject settings the game cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.game.max_name_len == 0 {
            return Err(anyhow!("game.max_name_len must be at least 1"));
        }
        if self.game.starting_coins < 0 {
            return Err(anyhow!("game.starting_coins must not be negative"));
        }
        if self.game.xp_grant_min < 1 || self.game.xp_grant_min > self.game.xp_grant_max {
            return Err(anyhow!(
                "game.xp_grant_min ({}) must be >= 1 and <= game.xp_grant_max ({})",
                self.game.xp_grant_min,
                self.game.xp_grant_max
            ));
        }
        if self.auth.min_password_len == 0 {
            return Err(anyhow!("auth.min_password_len must be at least 1"));
        }
        if self.auth.max_failed_attempts == 0 {
            return Err(anyhow!("auth.max_failed_attempts must be at least 1"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            game: GameConfig::default(),
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                db_path: None,
            },
            auth: AuthConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("tavernrpg.log".to_string()),
                security_file: Some("tavernrpg-security.log".to_string()),
            },
        }
    }
}
