//! Experience to level mapping. Every 100 xp is one level; level 1 starts at 0 xp.

/// Experience needed per level.
pub const XP_PER_LEVEL: i64 = 100;

/// `floor(xp / 100) + 1`. Negative xp (possible after an admin revokes more
/// than was granted) floors toward negative infinity.
pub fn level_for_xp(xp: i64) -> i64 {
    xp.div_euclid(XP_PER_LEVEL) + 1
}

/// Experience still missing before the next level boundary. Always in
/// `1..=100`.
pub fn xp_to_next_level(xp: i64) -> i64 {
    level_for_xp(xp) * XP_PER_LEVEL - xp
}

/// Experience gathered inside the current level, `0..100`; drives the xp bar.
pub fn xp_into_level(xp: i64) -> i64 {
    xp.rem_euclid(XP_PER_LEVEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn century_boundaries() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(xp_to_next_level(0), 100);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(xp_to_next_level(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(xp_to_next_level(100), 100);
        assert_eq!(level_for_xp(250), 3);
        assert_eq!(xp_to_next_level(250), 50);
        assert_eq!(xp_into_level(250), 50);
    }

    #[test]
    fn formula_holds_and_is_monotonic() {
        let mut previous = level_for_xp(0);
        for xp in 0..5_000i64 {
            let level = level_for_xp(xp);
            assert_eq!(level, xp / 100 + 1);
            assert!(level >= previous);
            let remaining = xp_to_next_level(xp);
            assert!((1..=100).contains(&remaining), "xp {} -> {}", xp, remaining);
            assert_eq!(xp + remaining, level * XP_PER_LEVEL);
            previous = level;
        }
    }

    #[test]
    fn negative_xp_drops_below_level_one() {
        assert_eq!(level_for_xp(-1), 0);
        assert_eq!(xp_to_next_level(-1), 1);
        assert_eq!(level_for_xp(-100), 0);
        assert_eq!(level_for_xp(-101), -1);
    }
}
