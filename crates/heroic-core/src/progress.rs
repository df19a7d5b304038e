//! Level and XP arithmetic.
//!
//! The difficulty curve is geometric: reaching the next level from level `L`
//! costs `floor(50 * 1.5^(L-1))` XP. Everything here is pure so it can be
//! exercised without a session or a store.

use serde::{Deserialize, Serialize};

/// XP needed to leave level 1.
pub const XP_LEVEL_BASE: f64 = 50.0;
/// Growth factor applied per level.
pub const XP_LEVEL_FACTOR: f64 = 1.5;

/// Per-owner progression record.
///
/// `xp` counts experience within the current level only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub xp: u64,
    #[serde(default = "default_level")]
    pub level: u32,
}

fn default_level() -> u32 {
    1
}

impl Default for Progress {
    fn default() -> Self {
        Self { xp: 0, level: 1 }
    }
}

impl Progress {
    pub fn new(xp: u64, level: u32) -> Self {
        Self { xp, level }
    }

    /// XP threshold for the current level.
    pub fn xp_to_next_level(&self) -> u64 {
        xp_to_reach_next_level(self.level)
    }

    /// 0.0 .. 1.0 fill of the XP bar.
    pub fn fraction(&self) -> f64 {
        let needed = self.xp_to_next_level();
        if needed == 0 {
            return 0.0;
        }
        (self.xp as f64 / needed as f64).min(1.0)
    }

    pub fn rank(&self) -> Rank {
        Rank::for_level(self.level)
    }

    /// Bring a record that violates the rollover invariant back in line.
    ///
    /// Records loaded from storage may have been written by older clients or
    /// edited by hand; a level of 0 is lifted to 1 and surplus XP rolls over.
    pub fn normalized(self) -> Self {
        let mut progress = Self {
            xp: self.xp,
            level: self.level.max(1),
        };
        roll_over(&mut progress);
        progress
    }
}

/// Outcome of [`apply_xp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpApplication {
    pub progress: Progress,
    /// True if at least one rollover happened.
    pub leveled_up: bool,
}

/// `floor(BASE * FACTOR^(level-1))`. Level 0 is treated as level 1.
pub fn xp_to_reach_next_level(level: u32) -> u64 {
    let exponent = level.max(1) - 1;
    let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
    let threshold = (XP_LEVEL_BASE * XP_LEVEL_FACTOR.powi(exponent)).floor();
    // `as` saturates for out-of-range floats.
    threshold as u64
}

/// Add `amount` XP and roll over as many levels as it pays for.
///
/// Non-positive amounts are ignored and the input is returned unchanged.
pub fn apply_xp(progress: Progress, amount: i64) -> XpApplication {
    if amount <= 0 {
        return XpApplication {
            progress,
            leveled_up: false,
        };
    }

    let mut next = Progress {
        xp: progress.xp.saturating_add(amount as u64),
        level: progress.level.max(1),
    };
    let leveled_up = roll_over(&mut next);
    XpApplication {
        progress: next,
        leveled_up,
    }
}

fn roll_over(progress: &mut Progress) -> bool {
    let mut rolled = false;
    loop {
        let threshold = xp_to_reach_next_level(progress.level);
        if progress.xp < threshold || progress.level == u32::MAX {
            break;
        }
        progress.xp -= threshold;
        progress.level += 1;
        rolled = true;
    }
    rolled
}

/// Display title earned by level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    RookiePlumber,
    FieldAgent,
    GalacticHero,
    KeeperOfTheOmnitrix,
    LegendOfTheUniverse,
}

impl Rank {
    pub fn for_level(level: u32) -> Self {
        match level {
            0..=4 => Rank::RookiePlumber,
            5..=9 => Rank::FieldAgent,
            10..=14 => Rank::GalacticHero,
            15..=19 => Rank::KeeperOfTheOmnitrix,
            _ => Rank::LegendOfTheUniverse,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Rank::RookiePlumber => "Rookie Plumber",
            Rank::FieldAgent => "Field Agent",
            Rank::GalacticHero => "Galactic Hero",
            Rank::KeeperOfTheOmnitrix => "Keeper of the Omnitrix",
            Rank::LegendOfTheUniverse => "Legend of the Universe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_follow_geometric_curve() {
        let cases = [(1, 50), (2, 75), (3, 112), (4, 168), (5, 253)];
        for (level, expected) in cases {
            assert_eq!(xp_to_reach_next_level(level), expected, "level {level}");
        }
    }

    #[test]
    fn apply_xp_table() {
        // (xp, level, amount) -> (xp, level, leveled_up)
        let cases = [
            ((45, 1, 10), (5, 2, true)),
            ((0, 1, 49), (49, 1, false)),
            ((0, 1, 50), (0, 2, true)),
            ((74, 2, 1), (0, 3, true)),
            ((10, 3, 15), (25, 3, false)),
        ];
        for ((xp, level, amount), (want_xp, want_level, want_up)) in cases {
            let out = apply_xp(Progress::new(xp, level), amount);
            assert_eq!(out.progress, Progress::new(want_xp, want_level));
            assert_eq!(out.leveled_up, want_up);
        }
    }

    #[test]
    fn large_award_cascades_several_levels() {
        let out = apply_xp(Progress::default(), 500);
        // 50 + 75 + 112 + 168 = 405, next threshold 253
        assert_eq!(out.progress, Progress::new(95, 5));
        assert!(out.leveled_up);
        assert!(out.progress.xp < out.progress.xp_to_next_level());
    }

    #[test]
    fn non_positive_amounts_are_noops() {
        let start = Progress::new(30, 2);
        for amount in [0, -5, i64::MIN] {
            let out = apply_xp(start, amount);
            assert_eq!(out.progress, start);
            assert!(!out.leveled_up);
        }
    }

    #[test]
    fn normalized_repairs_rolled_over_records() {
        assert_eq!(Progress::new(60, 1).normalized(), Progress::new(10, 2));
        assert_eq!(Progress::new(10, 0).normalized(), Progress::new(10, 1));
        assert_eq!(Progress::new(3, 4).normalized(), Progress::new(3, 4));
    }

    #[test]
    fn corrupt_huge_level_is_left_in_place() {
        assert_eq!(xp_to_reach_next_level(3_000_000_000), u64::MAX);
        assert_eq!(xp_to_reach_next_level(u32::MAX), u64::MAX);
        let stored: Progress = serde_json::from_str(r#"{"xp":10,"level":3000000000}"#).unwrap();
        assert_eq!(stored.normalized(), Progress::new(10, 3_000_000_000));
    }

    #[test]
    fn ranks_by_level() {
        assert_eq!(Rank::for_level(1).title(), "Rookie Plumber");
        assert_eq!(Rank::for_level(5), Rank::FieldAgent);
        assert_eq!(Rank::for_level(14), Rank::GalacticHero);
        assert_eq!(Rank::for_level(19), Rank::KeeperOfTheOmnitrix);
        assert_eq!(Rank::for_level(20), Rank::LegendOfTheUniverse);
    }

    #[test]
    fn fraction_fills_bar() {
        assert_eq!(Progress::new(25, 1).fraction(), 0.5);
        assert_eq!(Progress::default().fraction(), 0.0);
    }
}
