mod cycle;
mod engine;

pub use cycle::{
    validate_work_minutes, CycleDurations, CycleType, MAX_WORK_MINUTES, MIN_WORK_MINUTES,
};
pub use engine::{format_clock, FocusTimer};
