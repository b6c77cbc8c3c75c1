// Run state shared between the controller, the worker and any listener.
//
// Every mutation goes through StateManager::update, which diffs the state
// before and after and broadcasts the difference as StateChange events.

use crate::models::{AppState, RelabelConfig, RunPhase, RunSummary, ValidationError};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Events broadcast to listeners as the run state changes
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The run lifecycle moved to a new phase
    PhaseChanged { phase: RunPhase },

    /// The background walk has started
    RunStarted { root: Utf8PathBuf },

    /// Another file was scanned
    ProgressUpdated {
        files_scanned: usize,
        files_modified: usize,
        current_file: Option<Utf8PathBuf>,
    },

    /// A file was rewritten
    FileModified { path: Utf8PathBuf },

    /// The run reached a terminal outcome
    RunFinished { outcome: RunSummary },

    /// Relabel settings were replaced from configuration
    SettingsChanged,
}

/// Shared [`AppState`] behind a lock, with change notification.
///
/// Listeners subscribe to a broadcast channel; slow listeners may lag and
/// skip events but never block the worker. The phase transitions of a run
/// (`Idle → Validating → Running → Idle`) are made here so that the
/// busy check and the transition happen under one write lock.
#[derive(Debug)]
pub struct StateManager {
    state: Arc<RwLock<AppState>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create an idle state manager; the event channel buffers 256 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.read().unwrap().clone()
    }

    /// Run `f` under the read lock
    ///
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_busy());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Mutate the state under the write lock and broadcast what changed.
    ///
    /// Returns the events that were sent.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);

        for change in &changes {
            // No receivers is not an error.
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Receiver for every event sent after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Events describing the difference between `old` and `new`
    fn detect_changes(&self, old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.phase != new.phase {
            changes.push(StateChange::PhaseChanged { phase: new.phase });

            if new.phase == RunPhase::Running {
                if let Some(root) = &new.root {
                    changes.push(StateChange::RunStarted { root: root.clone() });
                }
            }
        }

        if old.files_scanned != new.files_scanned
            || old.modified_files.len() != new.modified_files.len()
            || old.current_file != new.current_file
        {
            changes.push(StateChange::ProgressUpdated {
                files_scanned: new.files_scanned,
                files_modified: new.modified_files.len(),
                current_file: new.current_file.clone(),
            });
        }

        if old.last_outcome != new.last_outcome {
            if let Some(outcome) = &new.last_outcome {
                changes.push(StateChange::RunFinished {
                    outcome: outcome.clone(),
                });
            }
        }

        if old.settings != new.settings {
            changes.push(StateChange::SettingsChanged);
        }

        changes
    }

    // Convenience methods for the run lifecycle

    /// Move from Idle to Validating, discarding the previous run's results
    ///
    /// # Errors
    /// [`ValidationError::AlreadyRunning`] if a run is validating or running
    pub fn try_begin_run(&self) -> Result<Vec<StateChange>, ValidationError> {
        let mut busy = false;
        let changes = self.update(|state| {
            if state.is_busy() {
                busy = true;
                return;
            }
            state.reset_run_state();
            state.phase = RunPhase::Validating;
        });

        if busy {
            return Err(ValidationError::AlreadyRunning);
        }
        Ok(changes)
    }

    /// Return to Idle after a validation failure
    pub fn abort_validation(&self) -> Vec<StateChange> {
        self.update(|state| {
            if state.phase == RunPhase::Validating {
                state.phase = RunPhase::Idle;
            }
        })
    }

    /// Enter the Running phase for `root`
    pub fn start_run(&self, root: Utf8PathBuf) -> Vec<StateChange> {
        self.update(|state| {
            state.root = Some(root);
            state.phase = RunPhase::Running;
        })
    }

    /// Record that the walker entered a directory
    pub fn record_directory(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.directories_visited += 1;
        })
    }

    /// Record a processed file
    pub fn record_file(&self, path: &Utf8Path, modified: bool) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.files_scanned += 1;
            state.current_file = Some(path.to_path_buf());
            if modified {
                state.modified_files.push(path.to_path_buf());
            }
        });

        if modified {
            let event = StateChange::FileModified {
                path: path.to_path_buf(),
            };
            let _ = self.state_tx.send(event.clone());
            changes.push(event);
        }

        changes
    }

    /// Finish the current run and return to Idle
    pub fn finish_run(&self, outcome: RunSummary) -> Vec<StateChange> {
        self.update(|state| {
            state.phase = RunPhase::Idle;
            state.current_file = None;
            state.last_outcome = Some(outcome);
        })
    }

    /// Replace the settings with the ones from `config`
    pub fn load_from_config(&self, config: &RelabelConfig) -> Vec<StateChange> {
        self.update(|state| {
            state.settings = config.settings.clone();

            tracing::info!(
                "Loaded settings: extension={}, marker={}, string_type={}, allow_empty_replacement={}",
                state.settings.resource_extension,
                state.settings.marker_file,
                state.settings.string_type,
                state.settings.allow_empty_replacement
            );
        })
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same state and channel.
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeKind;

    fn completed(modified_files: usize) -> RunSummary {
        RunSummary {
            kind: OutcomeKind::Completed,
            modified_files,
            message: None,
            detail: None,
        }
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert_eq!(state.phase, RunPhase::Idle);
        assert_eq!(state.files_scanned, 0);
        assert!(state.modified_files.is_empty());
    }

    #[test]
    fn test_lifecycle_events() {
        let manager = StateManager::new();

        let changes = manager.try_begin_run().unwrap();
        assert_eq!(
            changes,
            vec![StateChange::PhaseChanged {
                phase: RunPhase::Validating
            }]
        );

        let changes = manager.start_run(Utf8PathBuf::from("/project"));
        assert!(changes.contains(&StateChange::PhaseChanged {
            phase: RunPhase::Running
        }));
        assert!(changes.contains(&StateChange::RunStarted {
            root: Utf8PathBuf::from("/project")
        }));

        let changes = manager.finish_run(completed(0));
        assert!(changes.contains(&StateChange::PhaseChanged {
            phase: RunPhase::Idle
        }));
        assert!(changes.contains(&StateChange::RunFinished {
            outcome: completed(0)
        }));
    }

    #[test]
    fn test_second_run_rejected_while_busy() {
        let manager = StateManager::new();
        manager.try_begin_run().unwrap();

        assert!(matches!(
            manager.try_begin_run(),
            Err(ValidationError::AlreadyRunning)
        ));

        manager.start_run(Utf8PathBuf::from("/project"));
        assert!(matches!(
            manager.try_begin_run(),
            Err(ValidationError::AlreadyRunning)
        ));

        manager.finish_run(completed(0));
        assert!(manager.try_begin_run().is_ok());
    }

    #[test]
    fn test_abort_validation_returns_to_idle() {
        let manager = StateManager::new();
        manager.try_begin_run().unwrap();
        manager.abort_validation();
        assert_eq!(manager.read(|s| s.phase), RunPhase::Idle);
    }

    #[test]
    fn test_record_file_tracks_modified_list() {
        let manager = StateManager::new();
        manager.try_begin_run().unwrap();
        manager.start_run(Utf8PathBuf::from("/project"));

        manager.record_file(Utf8Path::new("/project/a.resx"), false);
        let changes = manager.record_file(Utf8Path::new("/project/b.resx"), true);

        assert!(changes.contains(&StateChange::FileModified {
            path: Utf8PathBuf::from("/project/b.resx")
        }));
        assert!(changes.contains(&StateChange::ProgressUpdated {
            files_scanned: 2,
            files_modified: 1,
            current_file: Some(Utf8PathBuf::from("/project/b.resx")),
        }));

        let state = manager.snapshot();
        assert_eq!(state.modified_files, vec![Utf8PathBuf::from("/project/b.resx")]);
    }

    #[test]
    fn test_new_run_discards_previous_results() {
        let manager = StateManager::new();
        manager.try_begin_run().unwrap();
        manager.start_run(Utf8PathBuf::from("/project"));
        manager.record_file(Utf8Path::new("/project/a.resx"), true);
        manager.finish_run(completed(1));

        manager.try_begin_run().unwrap();
        let state = manager.snapshot();
        assert!(state.modified_files.is_empty());
        assert!(state.last_outcome.is_none());
    }

    #[test]
    fn test_settings_change_detection() {
        let manager = StateManager::new();
        let mut config = RelabelConfig::default();
        config.settings.debug_mode = true;

        let changes = manager.load_from_config(&config);
        assert!(changes.contains(&StateChange::SettingsChanged));

        let changes = manager.load_from_config(&config);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_clone_shares_state() {
        let manager = StateManager::new();
        let clone = manager.clone();

        manager.try_begin_run().unwrap();
        assert_eq!(clone.read(|s| s.phase), RunPhase::Validating);
    }
}
