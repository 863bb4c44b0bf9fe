use thiserror::Error;

use crate::gateway::StoreError;
use crate::validation::InputError;

/// Errors surfaced by the character, room and admin operations.
///
/// None of these is fatal. The presentation layer shows
/// [`GameError::user_message`] as a transient notice and leaves its view
/// untouched; the user retries by repeating the action.
#[derive(Debug, Error)]
pub enum GameError {
    /// Input rejected before anything was read or written.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Room, code, account or character slot does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Purchase price exceeds the character's coins.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },

    /// Admin-only operation attempted without the admin role.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Room operation issued while the session is idle.
    #[error("not in a room")]
    NotInRoom,

    /// Any persistence gateway failure.
    #[error("transport error: {0}")]
    Transport(#[from] StoreError),
}

impl GameError {
    pub fn not_found(what: impl Into<String>) -> Self {
        GameError::NotFound(what.into())
    }

    /// Short text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            GameError::Validation(reason) => reason.clone(),
            GameError::NotFound(what) => format!("{} not found", what),
            GameError::InsufficientFunds { .. } => "Not enough coins!".to_string(),
            GameError::PermissionDenied(_) => "Only admins can do that".to_string(),
            GameError::NotInRoom => "You are not in a room".to_string(),
            GameError::Transport(_) => "Something went wrong, please try again".to_string(),
        }
    }

    /// Whether repeating the same action may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GameError::Transport(_))
    }
}

impl From<InputError> for GameError {
    fn from(err: InputError) -> Self {
        GameError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient_and_generic() {
        let err = GameError::from(StoreError::Unavailable("down".to_string()));
        assert!(err.is_transient());
        assert!(!err.user_message().contains("down"));
    }

    #[test]
    fn funds_message_is_stable() {
        let err = GameError::InsufficientFunds {
            needed: 500,
            available: 100,
        };
        assert!(!err.is_transient());
        assert_eq!(err.user_message(), "Not enough coins!");
    }
}
