//! Focus timer state machine.
//!
//! The timer does not own a thread. The caller invokes `tick()` once per
//! second while it is running; each tick removes one second.
//!
//! ## Cycle rotation
//!
//! ```text
//! work --(n % 4 != 0)--> shortBreak --> work
//! work --(n % 4 == 0)--> longBreak  --> work
//! ```
//!
//! `n` is the number of completed work cycles. The timer stops after every
//! expiry; the next cycle waits for `start()`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = FocusTimer::default();
//! timer.start();
//! // once per second:
//! if let Some(event) = timer.tick() { /* cycle finished */ }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::cycle::{validate_work_minutes, CycleDurations, CycleType};
use crate::error::ValidationError;
use crate::events::Event;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusTimer {
    durations: CycleDurations,
    cycle: CycleType,
    running: bool,
    remaining_secs: u32,
    /// Completed work cycles since the last reset-all.
    work_cycles: u32,
}

impl FocusTimer {
    /// Idle timer at the start of a work cycle.
    pub fn new(durations: CycleDurations) -> Self {
        Self {
            durations,
            cycle: CycleType::Work,
            running: false,
            remaining_secs: durations.work_secs,
            work_cycles: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn cycle(&self) -> CycleType {
        self.cycle
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn work_cycles(&self) -> u32 {
        self.work_cycles
    }

    pub fn durations(&self) -> &CycleDurations {
        &self.durations
    }

    pub fn total_secs(&self) -> u32 {
        self.durations.secs_for(self.cycle)
    }

    /// 0.0 .. 100.0 elapsed within the current cycle.
    pub fn progress_pct(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        let elapsed = total.saturating_sub(self.remaining_secs);
        f64::from(elapsed) / f64::from(total) * 100.0
    }

    /// Remaining time as `MM:SS`.
    pub fn display(&self) -> String {
        format_clock(self.remaining_secs)
    }

    pub fn snapshot(&self) -> Event {
        Event::TimerSnapshot {
            cycle: self.cycle,
            running: self.running,
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs(),
            progress_pct: self.progress_pct(),
            work_cycles: self.work_cycles,
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.running {
            return None;
        }
        self.running = true;
        Some(Event::TimerStarted {
            cycle: self.cycle,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.running {
            return None;
        }
        self.running = false;
        Some(Event::TimerPaused {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Start when stopped, pause when running.
    pub fn toggle(&mut self) -> Option<Event> {
        if self.running {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Call once per second. Returns `Some(Event::CycleCompleted)` when the
    /// current cycle runs out.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.running {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return None;
        }

        let finished = self.cycle;
        self.advance();
        tracing::debug!(?finished, next = ?self.cycle, work_cycles = self.work_cycles, "focus cycle finished");
        Some(Event::CycleCompleted {
            finished,
            next: self.cycle,
            work_cycles: self.work_cycles,
            at: Utc::now(),
        })
    }

    /// Restore the current cycle's full duration and stop. The cycle type
    /// and work-cycle counter are untouched.
    pub fn reset_current(&mut self) -> Event {
        self.running = false;
        self.remaining_secs = self.total_secs();
        Event::TimerReset {
            cycle: self.cycle,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        }
    }

    /// Back to a stopped work cycle with the counter cleared.
    pub fn reset_all(&mut self) -> Event {
        self.running = false;
        self.cycle = CycleType::Work;
        self.work_cycles = 0;
        self.remaining_secs = self.durations.work_secs;
        Event::TimerResetAll { at: Utc::now() }
    }

    /// Change the work length. While in a work cycle the remaining time is
    /// retargeted to the new length, running or not; elapsed time is not
    /// carried over.
    pub fn set_work_minutes(&mut self, minutes: u32) -> Result<Event, ValidationError> {
        let minutes = validate_work_minutes(minutes)?;
        self.durations.work_secs = minutes * 60;
        if self.cycle == CycleType::Work {
            self.remaining_secs = self.durations.work_secs;
        }
        Ok(Event::WorkDurationChanged {
            minutes,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn advance(&mut self) {
        self.running = false;
        self.cycle = match self.cycle {
            CycleType::Work => {
                self.work_cycles += 1;
                self.durations.break_after(self.work_cycles)
            }
            CycleType::ShortBreak | CycleType::LongBreak => CycleType::Work,
        };
        self.remaining_secs = self.durations.secs_for(self.cycle);
    }
}

impl Default for FocusTimer {
    fn default() -> Self {
        Self::new(CycleDurations::default())
    }
}

/// `MM:SS`, minutes not capped at 59.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
