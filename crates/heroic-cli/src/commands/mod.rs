pub mod config;
pub mod progress;
pub mod report;
pub mod session;
pub mod task;
pub mod timer;
