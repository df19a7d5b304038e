use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MIN_WORK_MINUTES: u32 = 1;
pub const MAX_WORK_MINUTES: u32 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CycleType {
    Work,
    ShortBreak,
    LongBreak,
}

impl CycleType {
    pub fn is_break(self) -> bool {
        !matches!(self, CycleType::Work)
    }

    pub fn label(self) -> &'static str {
        match self {
            CycleType::Work => "Focus Time",
            CycleType::ShortBreak => "Short Break",
            CycleType::LongBreak => "Long Break",
        }
    }
}

/// Configured length of each cycle, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleDurations {
    pub work_secs: u32,
    pub short_break_secs: u32,
    pub long_break_secs: u32,
    /// Every n-th completed work cycle is followed by a long break.
    pub cycles_before_long_break: u32,
}

impl CycleDurations {
    /// Work is clamped to the accepted range; breaks last at least a minute.
    pub fn from_minutes(work: u32, short_break: u32, long_break: u32, cycles_before_long_break: u32) -> Self {
        let work = work.clamp(MIN_WORK_MINUTES, MAX_WORK_MINUTES);
        Self {
            work_secs: work * 60,
            short_break_secs: short_break.max(1).saturating_mul(60),
            long_break_secs: long_break.max(1).saturating_mul(60),
            cycles_before_long_break: cycles_before_long_break.max(1),
        }
    }

    pub fn secs_for(&self, cycle: CycleType) -> u32 {
        match cycle {
            CycleType::Work => self.work_secs,
            CycleType::ShortBreak => self.short_break_secs,
            CycleType::LongBreak => self.long_break_secs,
        }
    }

    /// Break that follows the `completed_work_cycles`-th work cycle.
    pub fn break_after(&self, completed_work_cycles: u32) -> CycleType {
        if completed_work_cycles % self.cycles_before_long_break.max(1) == 0 {
            CycleType::LongBreak
        } else {
            CycleType::ShortBreak
        }
    }
}

impl Default for CycleDurations {
    fn default() -> Self {
        Self::from_minutes(25, 5, 15, 4)
    }
}

/// Check a user-supplied work length.
pub fn validate_work_minutes(minutes: u32) -> Result<u32, ValidationError> {
    if (MIN_WORK_MINUTES..=MAX_WORK_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(ValidationError::WorkDurationOutOfRange {
            min: MIN_WORK_MINUTES,
            max: MAX_WORK_MINUTES,
            got: minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_durations() {
        let d = CycleDurations::default();
        assert_eq!(d.secs_for(CycleType::Work), 25 * 60);
        assert_eq!(d.secs_for(CycleType::ShortBreak), 5 * 60);
        assert_eq!(d.secs_for(CycleType::LongBreak), 15 * 60);
    }

    #[test]
    fn every_fourth_break_is_long() {
        let d = CycleDurations::default();
        let breaks: Vec<_> = (1..=8).map(|n| d.break_after(n)).collect();
        assert_eq!(breaks[3], CycleType::LongBreak);
        assert_eq!(breaks[7], CycleType::LongBreak);
        assert!(breaks[..3].iter().all(|b| *b == CycleType::ShortBreak));
    }

    #[test]
    fn work_minutes_bounds() {
        assert!(validate_work_minutes(0).is_err());
        assert_eq!(validate_work_minutes(1), Ok(1));
        assert_eq!(validate_work_minutes(240), Ok(240));
        assert!(validate_work_minutes(241).is_err());
    }

    #[test]
    fn out_of_range_minutes_are_clamped() {
        let d = CycleDurations::from_minutes(0, 0, 0, 0);
        assert_eq!(d.work_secs, 60);
        assert_eq!(d.short_break_secs, 60);
        assert_eq!(d.long_break_secs, 60);
        assert_eq!(d.cycles_before_long_break, 1);

        let d = CycleDurations::from_minutes(100_000, 5, 15, 4);
        assert_eq!(d.work_secs, MAX_WORK_MINUTES * 60);
    }
}
