// Task controller - runs relabel jobs on a background worker
//
// This module contains the TaskController which coordinates between:
// - The presentation layer (start / cancel / progress / outcome)
// - StateManager (run lifecycle and progress events)
// - TreeWalker (the actual traversal and rewrite work)
// - Metrics (counters across runs)

use crate::metrics::Metrics;
use crate::models::{Job, OutcomeKind, RelabelSettings, RunSummary, ValidationError};
use crate::services::{CancelFlag, TreeWalker, WalkEvent};
use crate::state::{StateChange, StateManager};
use anyhow::anyhow;
use camino::Utf8PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Terminal outcome of one relabel run
#[derive(Debug)]
pub enum RunOutcome {
    /// The whole tree was walked; holds every modified file in visit order
    Completed(Vec<Utf8PathBuf>),

    /// A cancel request stopped the walk; holds the files modified before it
    Cancelled(Vec<Utf8PathBuf>),

    /// A file or directory could not be processed. The error chain names the
    /// faulting path. Files modified before the fault stay modified.
    Failed(anyhow::Error),
}

impl RunOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RunOutcome::Completed(_) => OutcomeKind::Completed,
            RunOutcome::Cancelled(_) => OutcomeKind::Cancelled,
            RunOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }

    /// Files rewritten during the run; empty for failed runs
    pub fn modified_files(&self) -> &[Utf8PathBuf] {
        match self {
            RunOutcome::Completed(files) | RunOutcome::Cancelled(files) => files,
            RunOutcome::Failed(_) => &[],
        }
    }

    /// Newline-joined modified-file list
    pub fn modified_files_text(&self) -> String {
        self.modified_files()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Cloneable summary for state events
    pub fn summary(&self) -> RunSummary {
        let (message, detail) = match self {
            RunOutcome::Failed(err) => (Some(format!("{:#}", err)), Some(format!("{:?}", err))),
            _ => (None, None),
        };

        RunSummary {
            kind: self.kind(),
            modified_files: self.modified_files().len(),
            message,
            detail,
        }
    }
}

/// Handle to a run executing on the background worker
#[derive(Debug)]
pub struct RunHandle {
    task: JoinHandle<RunOutcome>,
    cancel: CancelFlag,
    state: Arc<StateManager>,
}

impl RunHandle {
    /// Request cooperative cancellation of this run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to reach its terminal outcome
    pub async fn wait(self) -> RunOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::error!("Relabel worker terminated abnormally: {}", join_err);
                let outcome = RunOutcome::Failed(anyhow!("Relabel worker terminated: {}", join_err));
                self.state.finish_run(outcome.summary());
                outcome
            }
        }
    }
}

/// Controller for relabel runs
///
/// Owns the cancellation flag and drives the run lifecycle through the
/// [`StateManager`]: `Idle → Validating → Running → Idle`. Validation happens
/// synchronously on the caller's thread; the walk itself runs on a tokio
/// blocking worker so the caller stays responsive.
///
/// # Example
/// ```ignore
/// let controller = TaskController::new(state, metrics, runtime.handle().clone());
/// let mut events = controller.subscribe();
///
/// let handle = controller.start("C:/Model", "Account", "Customer")?;
/// // ... on user request: controller.cancel();
/// match handle.wait().await {
///     RunOutcome::Completed(files) => { /* show files */ }
///     RunOutcome::Cancelled(_) => { /* some changes may already be saved */ }
///     RunOutcome::Failed(err) => { /* show err */ }
/// }
/// ```
pub struct TaskController {
    state: Arc<StateManager>,
    metrics: Arc<Metrics>,
    cancel: CancelFlag,
    runtime: tokio::runtime::Handle,
}

impl TaskController {
    /// Create a new controller
    ///
    /// # Arguments
    /// * `state` - Shared state manager; its settings drive file selection
    /// * `metrics` - Shared metrics sink
    /// * `runtime` - Handle to the tokio runtime used for the background worker
    pub fn new(
        state: Arc<StateManager>,
        metrics: Arc<Metrics>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            state,
            metrics,
            cancel: CancelFlag::new(),
            runtime,
        }
    }

    /// Subscribe to progress and lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state.subscribe()
    }

    /// Check whether a run is validating or running
    pub fn is_busy(&self) -> bool {
        self.state.read(|s| s.is_busy())
    }

    /// Validate raw input against the current settings without starting a run.
    ///
    /// Checks that every field is filled in, that the root is a directory,
    /// and that the marker file exists directly under it.
    pub fn validate(&self, root: &str, from: &str, to: &str) -> Result<Job, ValidationError> {
        let settings = self.state.read(|s| s.settings.clone());
        validate_job(&settings, root, from, to)
    }

    /// Validate the input and start a run on the background worker.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] synchronously, before any file is
    /// touched, if the input is invalid or another run is still active.
    pub fn start(&self, root: &str, from: &str, to: &str) -> Result<RunHandle, ValidationError> {
        self.state.try_begin_run()?;

        let settings = self.state.read(|s| s.settings.clone());
        let job = match validate_job(&settings, root, from, to) {
            Ok(job) => job,
            Err(err) => {
                tracing::warn!("Relabel rejected: {}", err);
                self.state.abort_validation();
                return Err(err);
            }
        };

        self.cancel.reset();
        self.state.start_run(job.root().to_path_buf());

        let walker = TreeWalker::from_settings(&settings);
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let cancel = self.cancel.clone();

        let task = self
            .runtime
            .spawn_blocking(move || execute(&walker, &job, &state, &metrics, &cancel));

        Ok(RunHandle {
            task,
            cancel: self.cancel.clone(),
            state: Arc::clone(&self.state),
        })
    }

    /// Validate, run, and wait for the outcome
    pub async fn run(&self, root: &str, from: &str, to: &str) -> Result<RunOutcome, ValidationError> {
        let handle = self.start(root, from, to)?;
        Ok(handle.wait().await)
    }

    /// Shared cancellation flag, for signal handlers and other detached callers
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Request cooperative cancellation of the active run
    ///
    /// The worker stops after the file it is currently rewriting.
    pub fn cancel(&self) {
        if self.is_busy() {
            tracing::warn!("Cancellation requested - the run will stop after the current file");
        }
        self.cancel.cancel();
    }
}

fn validate_job(
    settings: &RelabelSettings,
    root: &str,
    from: &str,
    to: &str,
) -> Result<Job, ValidationError> {
    let job = Job::new(root, from, to, settings.allow_empty_replacement)?;

    if !job.root().join(&settings.marker_file).is_file() {
        return Err(ValidationError::MissingMarker {
            root: job.root().to_path_buf(),
            marker: settings.marker_file.clone(),
        });
    }

    Ok(job)
}

/// Body of the background worker
fn execute(
    walker: &TreeWalker,
    job: &Job,
    state: &StateManager,
    metrics: &Metrics,
    cancel: &CancelFlag,
) -> RunOutcome {
    tracing::info!(
        "Relabel started: root={}, from={:?}, to={:?}",
        job.root(),
        job.search_text(),
        job.replace_text()
    );
    let started = Instant::now();

    let result = walker.walk_with_progress(
        job.root(),
        job.search_text(),
        job.replace_text(),
        cancel,
        |event| match event {
            WalkEvent::EnteredDirectory { .. } => {
                state.record_directory();
                metrics.record_directory();
            }
            WalkEvent::FileProcessed { path, modified } => {
                state.record_file(path, modified);
                metrics.record_file(modified);
            }
        },
    );

    let elapsed = started.elapsed();
    metrics.record_walk_time(elapsed);

    let outcome = match result {
        Ok(report) if report.cancelled => {
            tracing::warn!(
                "Relabel cancelled after {:.2}s - {} file(s) already modified",
                elapsed.as_secs_f32(),
                report.modified.len()
            );
            metrics.record_run_cancelled();
            RunOutcome::Cancelled(report.modified)
        }
        Ok(report) => {
            tracing::info!(
                "Relabel completed in {:.2}s - {} of {} file(s) modified",
                elapsed.as_secs_f32(),
                report.modified.len(),
                report.files_scanned
            );
            metrics.record_run_completed();
            RunOutcome::Completed(report.modified)
        }
        Err(err) => {
            let err = anyhow::Error::new(err).context(format!("Relabel of {} failed", job.root()));
            tracing::error!("{:#}", err);
            metrics.record_run_failed();
            RunOutcome::Failed(err)
        }
    };

    state.finish_run(outcome.summary());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunPhase;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        fs::write(root.join("project.info.xml"), "<project/>").unwrap();
        (dir, root)
    }

    fn controller() -> TaskController {
        TaskController::new(
            Arc::new(StateManager::new()),
            Arc::new(Metrics::new()),
            tokio::runtime::Handle::current(),
        )
    }

    #[test]
    fn test_summary_of_failed_outcome_keeps_chain() {
        let err = anyhow!("bad markup").context("Relabel of /p failed");
        let summary = RunOutcome::Failed(err).summary();

        assert_eq!(summary.kind, OutcomeKind::Failed);
        assert_eq!(summary.modified_files, 0);
        assert_eq!(summary.message.as_deref(), Some("Relabel of /p failed: bad markup"));
        assert!(summary.detail.unwrap().contains("bad markup"));
    }

    #[test]
    fn test_modified_files_text() {
        let outcome = RunOutcome::Completed(vec![
            Utf8PathBuf::from("/p/a.resx"),
            Utf8PathBuf::from("/p/sub/b.resx"),
        ]);
        assert_eq!(outcome.modified_files_text(), "/p/a.resx\n/p/sub/b.resx");
    }

    #[tokio::test]
    async fn test_validate_requires_marker() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_str().unwrap();

        let err = controller().validate(root, "a", "b").unwrap_err();
        assert!(matches!(err, ValidationError::MissingMarker { ref marker, .. } if marker == "project.info.xml"));
    }

    #[tokio::test]
    async fn test_rejected_start_returns_to_idle() {
        let controller = controller();
        let (_dir, root) = project();

        let err = controller.start(root.as_str(), "", "b").unwrap_err();
        assert!(matches!(err, ValidationError::EmptyField(_)));
        assert_eq!(controller.state.read(|s| s.phase), RunPhase::Idle);
    }

    #[tokio::test]
    async fn test_run_on_empty_project_completes() {
        let controller = controller();
        let (_dir, root) = project();

        let outcome = controller.run(root.as_str(), "a", "b").await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed(ref files) if files.is_empty()));
        assert!(!controller.is_busy());
    }
}
