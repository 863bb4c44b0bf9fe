//! # Identity Gateway
//!
//! Email/password authentication behind the [`IdentityProvider`] trait. The
//! provider only answers "who is this"; game data for the identity lives in
//! the `users` collection and is handled by
//! [`AccountService`](crate::game::accounts::AccountService).
//!
//! [`LocalIdentity`] keeps credential records in a sled tree (bincode
//! encoded) with Argon2id password hashes, and locks an email out after a
//! configurable number of consecutive failed sign-ins.

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use password_hash::{PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{Argon2Config, AuthConfig};
use crate::logutil::escape_log;
use crate::validation::{check_password_strength, email_key, validate_email, InputError};

macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}

const TREE_CREDENTIALS: &str = "credentials";

/// An authenticated identity. `uid` doubles as the account document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email already in use")]
    EmailInUse,

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("invalid email")]
    InvalidEmail,

    #[error("user not found")]
    UserNotFound,

    #[error("wrong password")]
    WrongPassword,

    #[error("too many attempts, retry in {retry_after_secs}s")]
    TooManyAttempts { retry_after_secs: i64 },

    #[error("identity backend error: {0}")]
    Transport(String),
}

impl AuthError {
    /// Short text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::EmailInUse => "This email address is already in use".to_string(),
            AuthError::WeakPassword { min } => {
                format!("Password must be at least {} characters", min)
            }
            AuthError::InvalidEmail => "Invalid email address".to_string(),
            AuthError::UserNotFound => "User not found".to_string(),
            AuthError::WrongPassword => "Wrong password".to_string(),
            AuthError::TooManyAttempts { .. } => {
                "Too many attempts. Please try again later".to_string()
            }
            AuthError::Transport(_) => "Could not reach the login service".to_string(),
        }
    }
}

impl From<sled::Error> for AuthError {
    fn from(err: sled::Error) -> Self {
        AuthError::Transport(err.to_string())
    }
}

impl From<bincode::Error> for AuthError {
    fn from(err: bincode::Error) -> Self {
        AuthError::Transport(err.to_string())
    }
}

/// Authentication backend.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider: Send + Sync {
    /// Register a new identity and sign it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Receiver that observes every sign-in and sign-out.
    fn on_auth_change(&self) -> watch::Receiver<Option<Identity>>;

    fn current(&self) -> Option<Identity> {
        self.on_auth_change().borrow().clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialRecord {
    uid: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

/// Build Argon2 parameters from config, falling back to library defaults for
/// anything unset or invalid.
pub fn argon2_from_config(config: Option<&Argon2Config>) -> Argon2<'static> {
    let Some(a) = config else {
        return Argon2::default();
    };
    let builder = Params::DEFAULT;
    let mem = a.memory_kib.unwrap_or(builder.m_cost());
    let time = a.time_cost.unwrap_or(builder.t_cost());
    let para = a.parallelism.unwrap_or(builder.p_cost());
    match Params::new(mem, time, para, None) {
        Ok(params) => Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        Err(_) => Argon2::default(),
    }
}

/// Sled-backed identity provider.
pub struct LocalIdentity {
    credentials: sled::Tree,
    policy: AuthConfig,
    argon2: Argon2<'static>,
    current: watch::Sender<Option<Identity>>,
}

impl LocalIdentity {
    /// Open the credential tree inside `db`.
    pub fn open(db: &sled::Db, policy: &AuthConfig) -> Result<Self, AuthError> {
        let credentials = db.open_tree(TREE_CREDENTIALS)?;
        let (current, _) = watch::channel(None);
        Ok(Self {
            credentials,
            argon2: argon2_from_config(policy.argon2.as_ref()),
            policy: policy.clone(),
            current,
        })
    }

    /// Number of registered identities.
    pub fn count(&self) -> usize {
        self.credentials.len()
    }

    fn load(&self, key: &str) -> Result<Option<CredentialRecord>, AuthError> {
        match self.credentials.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, record: &CredentialRecord) -> Result<(), AuthError> {
        let bytes = bincode::serialize(record)?;
        self.credentials.insert(key.as_bytes(), bytes)?;
        self.credentials.flush()?;
        Ok(())
    }

    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Transport(format!("password hash failure: {e}")))
    }

    fn verify(&self, password: &str, stored: &str) -> Result<bool, AuthError> {
        let parsed = password_hash::PasswordHash::new(stored)
            .map_err(|e| AuthError::Transport(format!("corrupt password hash: {e}")))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    fn announce(&self, identity: Option<Identity>) {
        self.current.send_replace(identity);
    }
}

impl IdentityProvider for LocalIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = validate_email(email).map_err(|_| AuthError::InvalidEmail)?;
        check_password_strength(password, self.policy.min_password_len).map_err(|e| match e {
            InputError::WeakPassword { min } => AuthError::WeakPassword { min },
            _ => AuthError::WeakPassword {
                min: self.policy.min_password_len,
            },
        })?;
        let key = email_key(&email);
        if self.load(&key)?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let record = CredentialRecord {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            email: email.clone(),
            password_hash: self.hash(password)?,
            created_at: Utc::now(),
            failed_attempts: 0,
            locked_until: None,
        };
        self.store(&key, &record)?;
        info!("registered identity {} ({})", record.uid, escape_log(&email));

        let identity = Identity {
            uid: record.uid,
            email,
        };
        self.announce(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = validate_email(email).map_err(|_| AuthError::InvalidEmail)?;
        let key = email_key(&email);
        let Some(mut record) = self.load(&key)? else {
            sec_log!("sign-in for unknown email {}", escape_log(&email));
            return Err(AuthError::UserNotFound);
        };

        let now = Utc::now();
        if let Some(until) = record.locked_until {
            if until > now {
                sec_log!("sign-in for locked email {}", escape_log(&email));
                return Err(AuthError::TooManyAttempts {
                    retry_after_secs: (until - now).num_seconds().max(1),
                });
            }
        }

        if !self.verify(password, &record.password_hash)? {
            record.failed_attempts += 1;
            if record.failed_attempts >= self.policy.max_failed_attempts {
                record.locked_until = Some(now + Duration::seconds(self.policy.lockout_seconds));
                record.failed_attempts = 0;
                sec_log!(
                    "locking {} for {}s after repeated failures",
                    escape_log(&email),
                    self.policy.lockout_seconds
                );
            } else {
                sec_log!(
                    "wrong password for {} ({} of {})",
                    escape_log(&email),
                    record.failed_attempts,
                    self.policy.max_failed_attempts
                );
            }
            self.store(&key, &record)?;
            return Err(AuthError::WrongPassword);
        }

        if record.failed_attempts > 0 || record.locked_until.is_some() {
            record.failed_attempts = 0;
            record.locked_until = None;
            self.store(&key, &record)?;
        }
        debug!("signed in {}", record.uid);
        let identity = Identity {
            uid: record.uid,
            email: record.email,
        };
        self.announce(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.announce(None);
        Ok(())
    }

    fn on_auth_change(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_policy() -> AuthConfig {
        AuthConfig {
            max_failed_attempts: 3,
            lockout_seconds: 60,
            argon2: Some(Argon2Config {
                memory_kib: Some(64),
                time_cost: Some(1),
                parallelism: Some(1),
            }),
            ..AuthConfig::default()
        }
    }

    fn provider() -> LocalIdentity {
        let db = sled::Config::new().temporary(true).open().expect("db");
        LocalIdentity::open(&db, &cheap_policy()).expect("identity")
    }

    #[tokio::test]
    async fn sign_up_validation_order() {
        let ids = provider();
        assert!(matches!(
            ids.sign_up("not-an-email", "x").await,
            Err(AuthError::InvalidEmail)
        ));
        assert!(matches!(
            ids.sign_up("a@tavern.example", "123").await,
            Err(AuthError::WeakPassword { min: 6 })
        ));
        ids.sign_up("a@tavern.example", "123456").await.expect("sign up");
        assert!(matches!(
            ids.sign_up("A@Tavern.Example", "abcdef").await,
            Err(AuthError::EmailInUse)
        ));
        assert_eq!(ids.count(), 1);
    }

    #[tokio::test]
    async fn sign_in_and_out_update_watchers() {
        let ids = provider();
        let mut rx = ids.on_auth_change();
        let created = ids.sign_up("b@tavern.example", "secret1").await.expect("sign up");
        ids.sign_out().await.expect("sign out");
        assert!(ids.current().is_none());

        let signed_in = ids.sign_in("B@tavern.example", "secret1").await.expect("sign in");
        assert_eq!(signed_in.uid, created.uid);
        assert!(rx.has_changed().expect("open"));
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&created));
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password() {
        let ids = provider();
        assert!(matches!(
            ids.sign_in("ghost@tavern.example", "whatever").await,
            Err(AuthError::UserNotFound)
        ));
        ids.sign_up("c@tavern.example", "secret1").await.expect("sign up");
        assert!(matches!(
            ids.sign_in("c@tavern.example", "nope").await,
            Err(AuthError::WrongPassword)
        ));
    }

    #[tokio::test]
    async fn repeated_failures_lock_the_email() {
        let ids = provider();
        ids.sign_up("d@tavern.example", "secret1").await.expect("sign up");
        for _ in 0..3 {
            assert!(matches!(
                ids.sign_in("d@tavern.example", "bad").await,
                Err(AuthError::WrongPassword)
            ));
        }
        // correct password is refused while locked
        assert!(matches!(
            ids.sign_in("d@tavern.example", "secret1").await,
            Err(AuthError::TooManyAttempts { .. })
        ));
    }
}
