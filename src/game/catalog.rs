//! Static game data: character classes, hats, shop stock, party games,
//! world-level challenges and the house rules.

use crate::game::errors::GameError;
use crate::game::types::{Item, ItemKind, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub base_stats: Stats,
    pub sprite: &'static str,
}

pub const CLASSES: &[ClassTemplate] = &[
    ClassTemplate {
        key: "barbarian",
        name: "Barbarian",
        description: "Strong and can drink a lot",
        base_stats: Stats::new(15, 12, 8),
        sprite: "🧔",
    },
    ClassTemplate {
        key: "mage",
        name: "Mage",
        description: "A clever drinker with tricks",
        base_stats: Stats::new(8, 6, 12),
        sprite: "🧙",
    },
    ClassTemplate {
        key: "marksman",
        name: "Marksman",
        description: "Precise and fast",
        base_stats: Stats::new(10, 8, 15),
        sprite: "🏹",
    },
    ClassTemplate {
        key: "paladin",
        name: "Paladin",
        description: "Honest and steadfast",
        base_stats: Stats::new(12, 10, 10),
        sprite: "⚔️",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: ItemKind,
    pub price: i64,
    pub description: &'static str,
    pub stats: Option<Stats>,
    pub effect: Option<&'static str>,
    pub sprite: Option<&'static str>,
}

impl ItemTemplate {
    pub fn to_item(&self) -> Item {
        Item {
            id: self.id.to_string(),
            name: self.name.to_string(),
            kind: self.kind,
            price: self.price,
            description: self.description.to_string(),
            stats: self.stats,
            effect: self.effect.map(str::to_string),
            sprite: self.sprite.map(str::to_string),
        }
    }
}

const fn hat(id: &'static str, name: &'static str, price: i64, sprite: &'static str) -> ItemTemplate {
    ItemTemplate {
        id,
        name,
        kind: ItemKind::Hat,
        price,
        description: "",
        stats: None,
        effect: None,
        sprite: Some(sprite),
    }
}

const fn gear(
    id: &'static str,
    name: &'static str,
    kind: ItemKind,
    price: i64,
    description: &'static str,
    stats: Stats,
) -> ItemTemplate {
    ItemTemplate {
        id,
        name,
        kind,
        price,
        description,
        stats: Some(stats),
        effect: None,
        sprite: None,
    }
}

const fn effect_item(
    id: &'static str,
    name: &'static str,
    kind: ItemKind,
    price: i64,
    description: &'static str,
    effect: &'static str,
) -> ItemTemplate {
    ItemTemplate {
        id,
        name,
        kind,
        price,
        description,
        stats: None,
        effect: Some(effect),
        sprite: None,
    }
}

/// Hats in ascending price order; the first one is the free starter.
pub const HATS: &[ItemTemplate] = &[
    hat("viking", "Viking Helm", 0, "🎩"),
    hat("party", "Party Hat", 50, "🎉"),
    hat("wizard", "Wizard Hat", 100, "🧙"),
    hat("pirate", "Pirate Hat", 200, "🏴‍☠️"),
    hat("crown", "Golden Crown", 500, "👑"),
];

pub const SHOP_ITEMS: &[ItemTemplate] = &[
    gear("armor_basic", "Leather Armor", ItemKind::Armor, 150, "+2 Alcohol tolerance", Stats::new(2, 0, 0)),
    gear("armor_chain", "Chain Mail", ItemKind::Armor, 300, "+5 Alcohol tolerance", Stats::new(5, 0, 0)),
    gear("boots_speed", "Boots of Speed", ItemKind::Boots, 200, "+3 Energy", Stats::new(0, 0, 3)),
    gear("gloves_power", "Power Gloves", ItemKind::Gloves, 180, "+3 Stomach capacity", Stats::new(0, 3, 0)),
    effect_item("lucky_charm", "Lucky Charm", ItemKind::Accessory, 400, "Double XP for 5 games", "double_xp"),
    effect_item("beer_shield", "Beer Shield", ItemKind::Accessory, 350, "Protection against one chug", "protection"),
    effect_item("straw", "Straw", ItemKind::RealItem, 50, "Drink faster with a straw", "faster_drinking"),
    effect_item("cigarette", "Smoke Break", ItemKind::RealItem, 30, "A short break outside", "smoke_break"),
    effect_item("snorkel", "Snorkel", ItemKind::RealItem, 100, "Drink underwater", "underwater_drinking"),
    effect_item("napkin", "Napkin", ItemKind::RealItem, 20, "Wipe your mouth", "clean_mouth"),
    effect_item("ice_cube", "Ice Cube", ItemKind::Penalty, 25, "Drop it in someone's drink", "cold_drink"),
    effect_item("salt", "Salt", ItemKind::Penalty, 40, "Make a drink salty", "salty_drink"),
    effect_item("hot_sauce", "Hot Sauce", ItemKind::Penalty, 60, "Make a drink spicy", "spicy_drink"),
    effect_item("bubble_wrap", "Bubble Wrap", ItemKind::Penalty, 35, "Pop it while they drink", "distraction"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartyGame {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub xp_reward: i64,
    pub coin_reward: i64,
}

pub const PARTY_GAMES: &[PartyGame] = &[
    PartyGame { id: "mexican", name: "Mexican", description: "Dice game with beer", xp_reward: 50, coin_reward: 25 },
    PartyGame { id: "kings", name: "Kings", description: "Card game fit for kings", xp_reward: 75, coin_reward: 35 },
    PartyGame { id: "flip_cup", name: "Flip Cup", description: "Team cup flipping race", xp_reward: 60, coin_reward: 30 },
    PartyGame { id: "beer_pong", name: "Beer Pong", description: "Classic cup throwing", xp_reward: 80, coin_reward: 40 },
    PartyGame { id: "never_have_i", name: "Never Have I Ever", description: "Reveal your secrets", xp_reward: 40, coin_reward: 20 },
];

/// Challenge shown to a player at a given world level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldLevel {
    pub id: u32,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub task: &'static str,
}

pub const WORLD_LEVELS: &[WorldLevel] = &[
    WorldLevel {
        id: 1,
        name: "The Tavern Door",
        icon: "🚪",
        description: "Every legend starts with a first round.",
        task: "Finish your first drink before the next song ends.",
    },
    WorldLevel {
        id: 2,
        name: "The Dice Cellar",
        icon: "🎲",
        description: "The dwarves below only respect a lucky roll.",
        task: "Win one round of Mexican.",
    },
    WorldLevel {
        id: 3,
        name: "The Bard's Stage",
        icon: "🎤",
        description: "The crowd demands a performance.",
        task: "Sing the chorus of a song chosen by the table.",
    },
    WorldLevel {
        id: 4,
        name: "The Cup Gauntlet",
        icon: "🥤",
        description: "Only the steadiest hands pass.",
        task: "Flip three cups in a row without a miss.",
    },
    WorldLevel {
        id: 5,
        name: "The King's Court",
        icon: "👑",
        description: "The final hall. The king is watching.",
        task: "Win a game of Kings against at least two players.",
    },
];

pub const HOUSE_RULES: &[&str] = &[
    "Earn XP by completing the challenges of your world level",
    "The Battle of the Pints: who drinks fastest?",
    "Getting sick costs a life, you have three",
    "Win games to earn both XP and coins",
    "Buy items with coins, keep your XP for levels",
    "Give penalty items to other players",
    "Drink responsibly and have fun!",
];

/// Look up a class by key, ignoring case.
pub fn class(key: &str) -> Result<&'static ClassTemplate, GameError> {
    let key = key.trim();
    CLASSES
        .iter()
        .find(|c| c.key.eq_ignore_ascii_case(key))
        .ok_or_else(|| GameError::Validation(format!("unknown character class '{}'", key)))
}

/// The free hat every new character starts with.
pub fn starter_hat() -> Item {
    HATS[0].to_item()
}

pub fn hat_by_id(id: &str) -> Result<Item, GameError> {
    HATS.iter()
        .find(|h| h.id == id)
        .map(ItemTemplate::to_item)
        .ok_or_else(|| GameError::not_found(format!("hat '{}'", id)))
}

pub fn shop_item(id: &str) -> Result<Item, GameError> {
    SHOP_ITEMS
        .iter()
        .find(|i| i.id == id)
        .map(ItemTemplate::to_item)
        .ok_or_else(|| GameError::not_found(format!("item '{}'", id)))
}

pub fn party_game(id: &str) -> Result<&'static PartyGame, GameError> {
    PARTY_GAMES
        .iter()
        .find(|g| g.id == id)
        .ok_or_else(|| GameError::not_found(format!("game '{}'", id)))
}

pub fn world_level(level: u32) -> Result<&'static WorldLevel, GameError> {
    WORLD_LEVELS
        .iter()
        .find(|w| w.id == level)
        .ok_or_else(|| GameError::not_found(format!("world level {}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn class_lookup_is_case_insensitive() {
        assert_eq!(class("Barbarian").expect("class").base_stats, Stats::new(15, 12, 8));
        assert!(matches!(class("bard"), Err(GameError::Validation(_))));
    }

    #[test]
    fn starter_hat_is_free() {
        let hat = starter_hat();
        assert_eq!(hat.price, 0);
        assert_eq!(hat.kind, ItemKind::Hat);
    }

    #[test]
    fn ids_are_unique_and_prices_non_negative() {
        let mut seen = HashSet::new();
        for item in HATS.iter().chain(SHOP_ITEMS) {
            assert!(seen.insert(item.id), "duplicate id {}", item.id);
            assert!(item.price >= 0);
        }
    }

    #[test]
    fn world_levels_are_numbered_from_one() {
        for (idx, level) in WORLD_LEVELS.iter().enumerate() {
            assert_eq!(level.id as usize, idx + 1);
        }
        assert!(world_level(1).is_ok());
        assert!(matches!(world_level(99), Err(GameError::NotFound(_))));
    }
}
