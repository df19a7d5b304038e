use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use heroic_core::storage::Database;
use heroic_core::{cues_for, Config, Event, FocusTimer, SessionContext};

const TIMER_KEY: &str = "focus_timer";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Start or resume the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Start if paused, pause if running
    Toggle,
    /// Restore the current cycle's full duration
    Reset,
    /// Back to the first work cycle
    ResetAll,
    /// Change the work duration (1-240 minutes)
    SetWork {
        /// Minutes
        minutes: u32,
    },
    /// Run the countdown in the foreground until the current cycle ends
    Run,
}

/// Timer state as kept between invocations. `ticked_at` is the instant
/// `remaining_secs` was last accurate; a running timer is caught up from it.
#[derive(Serialize, Deserialize)]
struct SavedTimer {
    #[serde(flatten)]
    timer: FocusTimer,
    #[serde(default)]
    ticked_at: Option<DateTime<Utc>>,
}

/// Apply the whole seconds that passed while no process was ticking.
/// Returns the expiry event if the cycle ended in the meantime, and the
/// number of seconds consumed.
fn catch_up(timer: &mut FocusTimer, elapsed_secs: i64) -> (Option<Event>, i64) {
    let mut consumed = 0;
    while consumed < elapsed_secs && timer.is_running() {
        consumed += 1;
        if let Some(event) = timer.tick() {
            return (Some(event), consumed);
        }
    }
    (None, consumed)
}

fn load_timer(db: &Database, config: &Config, now: DateTime<Utc>) -> (SavedTimer, Option<Event>) {
    if let Ok(Some(json)) = db.kv_get(TIMER_KEY) {
        match serde_json::from_str::<SavedTimer>(&json) {
            Ok(mut saved) => {
                let mut expired = None;
                if let Some(at) = saved.ticked_at.filter(|_| saved.timer.is_running()) {
                    let elapsed = (now - at).num_seconds().max(0);
                    let (event, consumed) = catch_up(&mut saved.timer, elapsed);
                    saved.ticked_at = Some(at + chrono::Duration::seconds(consumed));
                    expired = event;
                }
                return (saved, expired);
            }
            Err(e) => tracing::warn!(error = %e, "discarding unreadable timer state"),
        }
    }
    let saved = SavedTimer {
        timer: FocusTimer::new(config.timer.durations()),
        ticked_at: None,
    };
    (saved, None)
}

fn save_timer(db: &Database, saved: &SavedTimer) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(saved)?;
    db.kv_set(TIMER_KEY, &json)?;
    Ok(())
}

fn print_event(event: &Event, context: &SessionContext) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    if !cues_for(event, context).is_empty() {
        // Terminal bell stands in for the sound cue.
        eprint!("\x07");
    }
    Ok(())
}

/// Count down in real time, one tick per second, until the cycle expires.
fn run_foreground(
    timer: &mut FocusTimer,
    context: &SessionContext,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(event) = timer.start() {
        print_event(&event, context)?;
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let finished = runtime.block_on(async {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Some(event) = timer.tick() {
                return event;
            }
            eprint!("\r{} {}  ", timer.cycle().label(), timer.display());
        }
    });
    eprintln!();
    print_event(&finished, context)
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let context = SessionContext::from_config(&config);
    let db = Database::open()?;
    let (mut saved, expired) = load_timer(&db, &config, Utc::now());
    if let Some(event) = &expired {
        print_event(event, &context)?;
    }
    let keeps_clock = matches!(action, TimerAction::Status);
    let timer = &mut saved.timer;

    match action {
        TimerAction::Status => {
            println!("{}", serde_json::to_string_pretty(&timer.snapshot())?);
        }
        TimerAction::Start | TimerAction::Pause | TimerAction::Toggle => {
            let event = match action {
                TimerAction::Start => timer.start(),
                TimerAction::Pause => timer.pause(),
                _ => timer.toggle(),
            };
            match event {
                Some(event) => print_event(&event, &context)?,
                None => println!("{}", serde_json::to_string_pretty(&timer.snapshot())?),
            }
        }
        TimerAction::Reset => print_event(&timer.reset_current(), &context)?,
        TimerAction::ResetAll => print_event(&timer.reset_all(), &context)?,
        TimerAction::SetWork { minutes } => {
            let event = timer.set_work_minutes(minutes)?;
            print_event(&event, &context)?;
        }
        TimerAction::Run => {
            run_foreground(timer, &context)?;
        }
    }

    if !keeps_clock || saved.ticked_at.is_none() {
        saved.ticked_at = Some(Utc::now());
    }
    save_timer(&db, &saved)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use heroic_core::timer::{CycleDurations, CycleType};

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        action: TimerAction,
    }

    #[test]
    fn set_work_takes_minutes() {
        let cli = TestCli::try_parse_from(["t", "set-work", "50"]).unwrap();
        assert!(matches!(cli.action, TimerAction::SetWork { minutes: 50 }));
        assert!(TestCli::try_parse_from(["t", "set-work", "-3"]).is_err());
    }

    #[test]
    fn catch_up_counts_down_only_while_running() {
        let mut timer = FocusTimer::new(CycleDurations::from_minutes(1, 1, 1, 4));
        assert_eq!(catch_up(&mut timer, 10), (None, 0));
        assert_eq!(timer.remaining_secs(), 60);

        timer.start();
        assert_eq!(catch_up(&mut timer, 15), (None, 15));
        assert_eq!(timer.remaining_secs(), 45);
        assert!(timer.is_running());
    }

    #[test]
    fn catch_up_stops_at_expiry() {
        let mut timer = FocusTimer::new(CycleDurations::from_minutes(1, 1, 1, 4));
        timer.start();
        let (event, consumed) = catch_up(&mut timer, 3600);
        assert_eq!(consumed, 60);
        assert!(matches!(event, Some(Event::CycleCompleted { .. })));
        assert!(!timer.is_running());
        assert_eq!(timer.cycle(), CycleType::ShortBreak);
    }

    #[test]
    fn saved_state_without_clock_still_loads() {
        let json = serde_json::to_string(&FocusTimer::new(CycleDurations::default())).unwrap();
        let saved: SavedTimer = serde_json::from_str(&json).unwrap();
        assert!(saved.ticked_at.is_none());
        assert_eq!(saved.timer.remaining_secs(), 1500);
    }

    #[test]
    fn reset_all_is_kebab_case() {
        let cli = TestCli::try_parse_from(["t", "reset-all"]).unwrap();
        assert!(matches!(cli.action, TimerAction::ResetAll));
    }
}
