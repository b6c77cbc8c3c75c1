// SlxRelabel - Relabel localized strings across a SalesLogix project
//
// This is the library crate containing the traversal-and-transform engine and the
// task controller. The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod controller;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use controller::{RunHandle, RunOutcome, TaskController};
pub use metrics::Metrics;
pub use models::{AppState, Job, RelabelConfig, RelabelSettings, ValidationError};
pub use services::{CancelFlag, ResxRewriter, TreeWalker};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
