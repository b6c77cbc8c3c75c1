use crate::models::RelabelSettings;
use camino::Utf8PathBuf;

/// Lifecycle phase of the relabel task.
///
/// `Idle → Validating → Running → Idle`. The terminal outcome of the last run
/// is kept separately in [`AppState::last_outcome`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Idle,
    Validating,
    Running,
}

/// Terminal outcome category of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    Completed,
    Cancelled,
    Failed,
}

/// Cloneable summary of a finished run, carried on state events
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub kind: OutcomeKind,
    pub modified_files: usize,
    /// Error message for failed runs
    pub message: Option<String>,
    /// Full error chain for failed runs
    pub detail: Option<String>,
}

/// Single source of truth for all application state.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`]
/// to provide thread-safe access across the application. Never access `AppState`
/// directly - always use [`StateManager`](crate::state::StateManager) methods:
/// - [`read()`](crate::state::StateManager::read) for read-only access
/// - [`update()`](crate::state::StateManager::update) for mutations with automatic change events
///
/// The cancellation flag is deliberately not part of this struct; it is an
/// atomic owned by [`crate::controller::TaskController`] and handed to the walker.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    // Runtime state
    pub phase: RunPhase,
    pub root: Option<Utf8PathBuf>,
    pub current_file: Option<Utf8PathBuf>,

    // Progress state
    pub files_scanned: usize,
    pub directories_visited: usize,

    // Results
    pub modified_files: Vec<Utf8PathBuf>,
    pub last_outcome: Option<RunSummary>,

    // Settings
    pub settings: RelabelSettings,
}

impl AppState {
    /// Create a new AppState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a run is validating or running
    pub fn is_busy(&self) -> bool {
        self.phase != RunPhase::Idle
    }

    /// Reset all run-related state, keeping settings
    pub fn reset_run_state(&mut self) {
        self.phase = RunPhase::Idle;
        self.root = None;
        self.current_file = None;
        self.files_scanned = 0;
        self.directories_visited = 0;
        self.modified_files.clear();
        self.last_outcome = None;
    }

    /// Newline-joined modified-file list, the format the result view expects
    pub fn modified_files_text(&self) -> String {
        self.modified_files
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        let state = AppState::new();
        assert_eq!(state.phase, RunPhase::Idle);
        assert!(!state.is_busy());
        assert!(state.modified_files.is_empty());
        assert!(state.last_outcome.is_none());
    }

    #[test]
    fn test_reset_run_state_keeps_settings() {
        let mut state = AppState::new();
        state.settings.debug_mode = true;
        state.phase = RunPhase::Running;
        state.files_scanned = 4;
        state.modified_files.push(Utf8PathBuf::from("/p/a.resx"));

        state.reset_run_state();

        assert_eq!(state.phase, RunPhase::Idle);
        assert_eq!(state.files_scanned, 0);
        assert!(state.modified_files.is_empty());
        assert!(state.settings.debug_mode);
    }

    #[test]
    fn test_modified_files_text() {
        let mut state = AppState::new();
        state.modified_files.push(Utf8PathBuf::from("/p/a.resx"));
        state.modified_files.push(Utf8PathBuf::from("/p/sub/b.resx"));

        assert_eq!(state.modified_files_text(), "/p/a.resx\n/p/sub/b.resx");
    }
}
