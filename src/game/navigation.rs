//! Navigation targets handed to the presentation layer, and their URL form.

use std::fmt;

use crate::game::errors::GameError;
use crate::game::types::SlotIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Characters,
    CreateCharacter {
        slot: SlotIndex,
    },
    Room {
        slot: SlotIndex,
        room_id: Option<String>,
    },
    /// Challenge view for a world level.
    Game {
        slot: SlotIndex,
        world_level: Option<u32>,
        room_id: Option<String>,
    },
    Admin,
}

impl Route {
    /// URL form, e.g. `/game/2?worldLevel=3&roomId=abc`.
    pub fn to_path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Characters => "/characters".to_string(),
            Route::CreateCharacter { slot } => format!("/create-character/{}", slot),
            Route::Room { slot, room_id } => {
                with_query(format!("/room/{}", slot), &[("roomId", room_id.clone())])
            }
            Route::Game {
                slot,
                world_level,
                room_id,
            } => with_query(
                format!("/game/{}", slot),
                &[
                    ("worldLevel", world_level.map(|l| l.to_string())),
                    ("roomId", room_id.clone()),
                ],
            ),
            Route::Admin => "/admin".to_string(),
        }
    }

    /// Parse a URL produced by [`Route::to_path`]. Unknown query keys are
    /// ignored.
    pub fn parse(url: &str) -> Result<Route, GameError> {
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (url, ""),
        };
        let params = parse_query(query)?;
        let param = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] | ["login"] => Ok(Route::Login),
            ["characters"] => Ok(Route::Characters),
            ["admin"] => Ok(Route::Admin),
            ["create-character", slot] => Ok(Route::CreateCharacter {
                slot: parse_slot(slot)?,
            }),
            ["room", slot] => Ok(Route::Room {
                slot: parse_slot(slot)?,
                room_id: param("roomId").filter(|id| !id.is_empty()),
            }),
            ["game", slot] => {
                let world_level = match param("worldLevel") {
                    Some(level) => match level.parse::<u32>() {
                        Ok(n) if n >= 1 => Some(n),
                        _ => {
                            return Err(GameError::Validation(format!(
                                "bad world level '{}'",
                                level
                            )))
                        }
                    },
                    None => None,
                };
                Ok(Route::Game {
                    slot: parse_slot(slot)?,
                    world_level,
                    room_id: param("roomId").filter(|id| !id.is_empty()),
                })
            }
            _ => Err(GameError::Validation(format!("unknown route '{}'", path))),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

fn parse_slot(raw: &str) -> Result<SlotIndex, GameError> {
    let index = raw
        .parse::<usize>()
        .map_err(|_| GameError::Validation(format!("bad slot '{}'", raw)))?;
    SlotIndex::new(index)
}

fn with_query(mut path: String, params: &[(&str, Option<String>)]) -> String {
    let mut sep = '?';
    for (key, value) in params {
        if let Some(value) = value {
            path.push(sep);
            path.push_str(key);
            path.push('=');
            path.push_str(&urlencoding::encode(value));
            sep = '&';
        }
    }
    path
}

fn parse_query(query: &str) -> Result<Vec<(String, String)>, GameError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(value)
                .map_err(|_| GameError::Validation(format!("bad query value for '{}'", key)))?;
            Ok((key.to_string(), value.into_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(i: usize) -> SlotIndex {
        SlotIndex::new(i).expect("slot")
    }

    #[test]
    fn game_route_carries_level_and_room() {
        let route = Route::Game {
            slot: slot(2),
            world_level: Some(3),
            room_id: Some("r1".to_string()),
        };
        assert_eq!(route.to_path(), "/game/2?worldLevel=3&roomId=r1");
        assert_eq!(Route::parse(&route.to_path()).expect("parse"), route);
    }

    #[test]
    fn optional_parameters_are_omitted() {
        let route = Route::Room {
            slot: slot(0),
            room_id: None,
        };
        assert_eq!(route.to_path(), "/room/0");
        let route = Route::Game {
            slot: slot(1),
            world_level: None,
            room_id: Some("a b&c".to_string()),
        };
        assert_eq!(route.to_path(), "/game/1?roomId=a%20b%26c");
        assert_eq!(Route::parse(&route.to_path()).expect("parse"), route);
    }

    #[test]
    fn rejects_bad_slots_and_unknown_paths() {
        assert!(Route::parse("/room/7").is_err());
        assert!(Route::parse("/room/x").is_err());
        assert!(Route::parse("/game/1?worldLevel=high").is_err());
        assert!(Route::parse("/tavern").is_err());
        assert_eq!(Route::parse("/").expect("root"), Route::Login);
    }

    #[test]
    fn world_levels_start_at_one() {
        assert!(matches!(
            Route::parse("/game/1?worldLevel=0"),
            Err(GameError::Validation(_))
        ));
        assert!(Route::parse("/game/1?worldLevel=1").is_ok());
    }
}
