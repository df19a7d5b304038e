//! # Heroic Tasks Core Library
//!
//! This library provides the core logic for Heroic Tasks, a gamified task
//! tracker: completing tasks earns XP, XP fills levels, and a focus timer
//! paces work. The `heroic-cli` binary is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Progress**: geometric level curve and XP rollover
//! - **Ledger**: awards XP exactly once per task, gated on `xpAwardedAt`
//! - **Backend**: one [`TaskStore`] trait with a local (guest) and a remote
//!   (signed-in) implementation
//! - **Session**: owner state machine routing mutations through the store
//! - **Timer**: work / short break / long break cycle engine driven by `tick()`
//!
//! ## Key Components
//!
//! - [`SessionController`]: session state and task operations
//! - [`FocusTimer`]: focus timer state machine
//! - [`Database`]: on-device slots for guest mode
//! - [`Config`]: application configuration management

pub mod backend;
pub mod error;
pub mod events;
pub mod feedback;
pub mod ledger;
pub mod progress;
pub mod report;
pub mod session;
pub mod storage;
pub mod task;
pub mod timer;

pub use backend::{HttpRemoteStore, LocalTaskStore, MemoryRemoteStore, Owner, RemoteStore, RemoteTaskStore, TaskStore};
pub use error::{ConfigError, EngineError, ErrorKind, StoreError, ValidationError};
pub use events::Event;
pub use feedback::{cues_for, toast_for, Cue, Toast};
pub use ledger::{on_completion_toggle, Award, CompletionOutcome};
pub use progress::{apply_xp, xp_to_reach_next_level, Progress, Rank};
pub use report::{build_report, DailyCompletions, Report};
pub use session::{Identity, SessionContext, SessionController, SessionStatus};
pub use storage::{Config, Database, MemorySlots, SlotStorage};
pub use task::{Priority, Task, TaskDraft};
pub use timer::{CycleType, FocusTimer};
