//! Accounts and roles.
//!
//! An account document (`users/{uid}`) is created the first time an identity
//! signs in. The caller's role is resolved once, when the session is
//! established, and carried in the [`AuthSession`] from then on.

use std::sync::Arc;

use log::{info, warn};
use serde_json::Value;

use crate::config::GameConfig;
use crate::game::errors::GameError;
use crate::game::types::{Account, USERS};
use crate::gateway::{to_fields, DocumentStore, Fields, SetOptions};
use crate::identity::{AuthError, Identity, IdentityProvider};
use crate::logutil::{escape_log, short_id};
use crate::validation::email_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Admin,
}

/// Who is acting, and with which role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub account_id: String,
    pub email: String,
    pub role: Role,
}

impl AuthSession {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub(crate) fn require_admin(&self, action: &str) -> Result<(), GameError> {
        if !self.is_admin() {
            warn!(
                target: "security",
                "{} attempted admin action '{}'",
                short_id(&self.account_id),
                action
            );
            return Err(GameError::PermissionDenied(action.to_string()));
        }
        Ok(())
    }
}

/// Failure while signing up or in: either the identity gateway refused, or
/// the account document could not be loaded afterwards.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Game(#[from] GameError),
}

impl AccessError {
    pub fn user_message(&self) -> String {
        match self {
            AccessError::Auth(e) => e.user_message(),
            AccessError::Game(e) => e.user_message(),
        }
    }
}

/// Load an account document.
pub async fn load_account<S: DocumentStore>(
    store: &S,
    account_id: &str,
) -> Result<Account, GameError> {
    let doc = store
        .get(USERS, account_id)
        .await?
        .ok_or_else(|| GameError::not_found(format!("account {}", short_id(account_id))))?;
    Ok(Account::from_document(&doc)?)
}

/// Every account document paired with its id.
pub async fn list_accounts<S: DocumentStore>(store: &S) -> Result<Vec<(String, Account)>, GameError> {
    let docs = store.list(USERS).await?;
    let mut accounts = Vec::with_capacity(docs.len());
    for doc in docs {
        match Account::from_document(&doc) {
            Ok(account) => accounts.push((doc.id, account)),
            Err(e) => warn!("skipping unreadable account {}: {}", short_id(&doc.id), e),
        }
    }
    Ok(accounts)
}

/// Find an account by email, ignoring case.
pub async fn find_account_by_email<S: DocumentStore>(
    store: &S,
    email: &str,
) -> Result<(String, Account), GameError> {
    let key = email_key(email);
    list_accounts(store)
        .await?
        .into_iter()
        .find(|(_, account)| email_key(&account.email) == key)
        .ok_or_else(|| GameError::not_found(format!("account {}", email)))
}

/// Set or clear the stored admin flag without a role check. Meant for
/// operator tooling with direct database access.
pub async fn set_admin_flag<S: DocumentStore>(
    store: &S,
    account_id: &str,
    is_admin: bool,
) -> Result<(), GameError> {
    let mut fields = Fields::new();
    fields.insert("isAdmin".to_string(), Value::Bool(is_admin));
    store
        .update(USERS, account_id, fields)
        .await
        .map_err(|e| match e {
            crate::gateway::StoreError::MissingDocument { .. } => {
                GameError::not_found(format!("account {}", short_id(account_id)))
            }
            other => GameError::Transport(other),
        })?;
    info!(target: "security", "admin flag of {} set to {}", short_id(account_id), is_admin);
    Ok(())
}

/// Grant the admin flag to another account. Only admins may do this.
pub async fn promote_admin<S: DocumentStore>(
    store: &S,
    actor: &AuthSession,
    account_id: &str,
) -> Result<(), GameError> {
    actor.require_admin("promote admin")?;
    set_admin_flag(store, account_id, true).await
}

/// Sign-up, sign-in and session establishment.
pub struct AccountService<S, I> {
    store: Arc<S>,
    identity: Arc<I>,
    config: GameConfig,
}

impl<S: DocumentStore, I: IdentityProvider> AccountService<S, I> {
    pub fn new(store: Arc<S>, identity: Arc<I>, config: GameConfig) -> Self {
        Self {
            store,
            identity,
            config,
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AccessError> {
        let identity = self.identity.sign_up(email, password).await?;
        Ok(self.establish(&identity).await?)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AccessError> {
        let identity = self.identity.sign_in(email, password).await?;
        Ok(self.establish(&identity).await?)
    }

    pub async fn sign_out(&self) -> Result<(), AccessError> {
        Ok(self.identity.sign_out().await?)
    }

    /// Load the identity's account document, creating it on first sign-in,
    /// and resolve the session role.
    pub async fn establish(&self, identity: &Identity) -> Result<AuthSession, GameError> {
        let listed_admin = self.config.is_admin_email(&identity.email);
        let stored_admin = match self.store.get(USERS, &identity.uid).await? {
            Some(doc) => Account::from_document(&doc)?.is_admin,
            None => {
                let account = Account::new(&identity.email, listed_admin);
                self.store
                    .set(USERS, &identity.uid, to_fields(&account)?, SetOptions::replace())
                    .await?;
                info!(
                    "created account {} for {}",
                    short_id(&identity.uid),
                    escape_log(&identity.email)
                );
                listed_admin
            }
        };
        let role = if listed_admin || stored_admin {
            Role::Admin
        } else {
            Role::Player
        };
        Ok(AuthSession {
            account_id: identity.uid.clone(),
            email: identity.email.clone(),
            role,
        })
    }
}
