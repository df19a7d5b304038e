mod config;
pub mod database;

pub use config::{Config, RemoteConfig, SoundConfig, TimerConfig};
pub use database::Database;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::StoreError;

/// String-keyed slots holding JSON snapshots on the device.
pub trait SlotStorage {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Volatile slots, for tests and for hosts without a writable disk.
#[derive(Debug, Default)]
pub struct MemorySlots {
    slots: RefCell<HashMap<String, String>>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStorage for MemorySlots {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Returns `~/.config/heroic-tasks[-dev]/` based on HEROIC_TASKS_ENV.
///
/// Set HEROIC_TASKS_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("HEROIC_TASKS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("heroic-tasks-dev")
    } else {
        base_dir.join("heroic-tasks")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
