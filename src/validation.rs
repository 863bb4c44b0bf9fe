//! Input validation for names, room codes, emails and passwords.
//!
//! All checks run before any gateway call so a rejected input never causes a
//! read or a write.

/// Input validation errors with helpful messages
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter a {field}")]
    Blank { field: &'static str },

    #[error("The {field} is too long (maximum {max} characters)")]
    TooLong { field: &'static str, max: usize },

    #[error("The {field} contains control characters")]
    ControlCharacters { field: &'static str },

    #[error("Enter a 4-letter room code")]
    BadRoomCode,

    #[error("Invalid email address")]
    BadEmail,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },
}

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 4;

/// Validate a character or room name: trimmed, non-empty, at most `max`
/// characters, no control characters. Returns the trimmed name.
pub fn validate_display_name(
    field: &'static str,
    input: &str,
    max: usize,
) -> Result<String, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::Blank { field });
    }
    if trimmed.chars().count() > max {
        return Err(InputError::TooLong { field, max });
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(InputError::ControlCharacters { field });
    }
    Ok(trimmed.to_string())
}

/// Normalize a user-typed room code to upper case. Exactly four ASCII
/// letters are accepted.
pub fn normalize_room_code(input: &str) -> Result<String, InputError> {
    let code = input.trim().to_ascii_uppercase();
    if code.len() != ROOM_CODE_LEN || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(InputError::BadRoomCode);
    }
    Ok(code)
}

/// Basic email syntax check: one `@`, a non-empty local part, a dotted
/// domain and no whitespace. Returns the trimmed address.
pub fn validate_email(input: &str) -> Result<String, InputError> {
    let email = input.trim();
    if email.chars().any(char::is_whitespace) {
        return Err(InputError::BadEmail);
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(InputError::BadEmail);
    };
    if local.is_empty()
        || domain.starts_with('.')
        || domain.ends_with('.')
        || !domain.contains('.')
    {
        return Err(InputError::BadEmail);
    }
    Ok(email.to_string())
}

/// Canonical form used for email comparisons and credential keys.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn check_password_strength(password: &str, min: usize) -> Result<(), InputError> {
    if password.chars().count() < min {
        return Err(InputError::WeakPassword { min });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_are_trimmed_and_bounded() {
        assert_eq!(
            validate_display_name("name", "  Grog  ", 20),
            Ok("Grog".to_string())
        );
        assert_eq!(
            validate_display_name("name", "   ", 20),
            Err(InputError::Blank { field: "name" })
        );
        assert_eq!(
            validate_display_name("name", &"x".repeat(21), 20),
            Err(InputError::TooLong {
                field: "name",
                max: 20
            })
        );
        assert!(validate_display_name("name", "bad\nname", 20).is_err());
    }

    #[test]
    fn room_codes_are_uppercased() {
        assert_eq!(normalize_room_code("abcd"), Ok("ABCD".to_string()));
        assert_eq!(normalize_room_code(" QwEr "), Ok("QWER".to_string()));
        for bad in ["", "abc", "abcde", "ab1d", "ÄBCD"] {
            assert_eq!(normalize_room_code(bad), Err(InputError::BadRoomCode), "{}", bad);
        }
    }

    #[test]
    fn email_syntax() {
        assert!(validate_email("host@tavern.example").is_ok());
        for bad in ["", "nope", "a@b", "@tavern.example", "a@@b.c", "a b@c.d", "a@.c"] {
            assert!(validate_email(bad).is_err(), "{}", bad);
        }
        assert_eq!(email_key(" Host@Tavern.Example "), "host@tavern.example");
    }

    #[test]
    fn password_minimum() {
        assert!(check_password_strength("123456", 6).is_ok());
        assert_eq!(
            check_password_strength("12345", 6),
            Err(InputError::WeakPassword { min: 6 })
        );
    }
}
