//! Data models for SlxRelabel.
//!
//! This module contains the core data structures used throughout the application:
//! - [`Job`]: The validated, immutable inputs of one relabel run
//! - [`AppState`]: The central state container holding run phase, progress, and results
//! - [`RelabelConfig`]: User settings loaded from `Relabel Config.yaml`
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: Config structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: AppState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager) for thread-safe access
//! - **Immutable**: State updates go through StateManager's `update()` method to ensure consistency

pub mod app_state;
pub mod config;
pub mod job;

pub use app_state::{AppState, OutcomeKind, RunPhase, RunSummary};
pub use config::{RelabelConfig, RelabelSettings};
pub use job::{Field, Job, ValidationError};
