use crate::models::RelabelSettings;
use crate::services::rewriter::{ResxRewriter, RewriteError};
use camino::{Utf8Path, Utf8PathBuf};
use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Cooperative cancellation flag shared between the requesting side and the walker.
///
/// Cloning shares the same underlying flag. The walker only observes it
/// between files and between directories, never in the middle of a rewrite.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }

    /// Clear a previous request; called when a new run starts
    pub fn reset(&self) {
        self.0.store(false, AtomicOrdering::SeqCst);
    }
}

/// Errors that abort a walk
#[derive(Error, Debug)]
pub enum WalkError {
    #[error("Failed to list directory {path}: {source}")]
    ReadDir {
        path: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

/// Progress notifications emitted while walking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent<'a> {
    /// A directory is about to be scanned
    EnteredDirectory { path: &'a Utf8Path },
    /// A candidate file was processed
    FileProcessed { path: &'a Utf8Path, modified: bool },
}

/// Outcome of one walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Files actually rewritten, in visit order
    pub modified: Vec<Utf8PathBuf>,
    pub files_scanned: usize,
    pub directories_visited: usize,
    /// `true` when the walk stopped early because of a cancel request
    pub cancelled: bool,
}

/// Walks a project tree and relabels every resource file in it.
///
/// Within each directory all candidate files are processed before any
/// subdirectory is entered; subdirectories are then walked depth-first. Both
/// files and subdirectories are visited in file-name order. `walkdir` keeps
/// its own stack of open directories, so deep trees do not grow the call stack.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    rewriter: ResxRewriter,
    extension: String,
}

impl TreeWalker {
    /// Create a walker selecting files by `extension` (without the dot)
    pub fn new(rewriter: ResxRewriter, extension: impl Into<String>) -> Self {
        Self {
            rewriter,
            extension: extension.into(),
        }
    }

    /// Create a walker from user settings
    pub fn from_settings(settings: &RelabelSettings) -> Self {
        Self::new(
            ResxRewriter::new(settings.string_type.clone()),
            settings.resource_extension.clone(),
        )
    }

    /// Walk `root` without progress notifications
    pub fn walk(
        &self,
        root: &Utf8Path,
        from: &str,
        to: &str,
        cancel: &CancelFlag,
    ) -> Result<WalkReport, WalkError> {
        self.walk_with_progress(root, from, to, cancel, |_| {})
    }

    /// Walk `root`, calling `on_event` as directories and files are processed.
    ///
    /// A cancel request is honoured after the current file finishes and once
    /// a directory has been fully processed; the report then holds whatever
    /// was modified so far.
    ///
    /// # Errors
    /// The first unreadable directory or failing file aborts the walk. Files
    /// rewritten before the failure stay rewritten.
    pub fn walk_with_progress<F>(
        &self,
        root: &Utf8Path,
        from: &str,
        to: &str,
        cancel: &CancelFlag,
        mut on_event: F,
    ) -> Result<WalkReport, WalkError>
    where
        F: FnMut(WalkEvent<'_>),
    {
        let mut report = WalkReport::default();

        // Symlinked directories are not entered; symlinked files are followed below.
        let mut entries = WalkDir::new(root)
            .follow_links(false)
            .sort_by(files_first)
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|source| walk_error(root, source))?;
            let is_dir = entry.file_type().is_dir();

            let path = match Utf8PathBuf::try_from(entry.into_path()) {
                Ok(path) => path,
                Err(err) => {
                    tracing::warn!("Skipping non UTF-8 path: {}", err.as_path().display());
                    if is_dir {
                        entries.skip_current_dir();
                    }
                    continue;
                }
            };

            if is_dir {
                // Every earlier directory is finished once the next one comes up.
                if cancel.is_cancelled() {
                    tracing::warn!("Walk cancelled before entering {}", path);
                    report.cancelled = true;
                    return Ok(report);
                }

                report.directories_visited += 1;
                on_event(WalkEvent::EnteredDirectory { path: &path });
                tracing::debug!("Scanning directory {}", path);
                continue;
            }

            if !path.is_file() || !self.is_candidate(&path) {
                continue;
            }

            let modified = self.rewriter.rewrite(&path, from, to)?;
            report.files_scanned += 1;

            on_event(WalkEvent::FileProcessed {
                path: &path,
                modified,
            });

            if modified {
                tracing::info!("Modified {}", path);
                report.modified.push(path);
            }

            if cancel.is_cancelled() {
                tracing::warn!("Walk cancelled after {} file(s)", report.files_scanned);
                report.cancelled = true;
                return Ok(report);
            }
        }

        // The last directory has no successor to check against.
        if cancel.is_cancelled() {
            tracing::warn!("Walk cancelled after the last directory");
            report.cancelled = true;
        }

        Ok(report)
    }

    fn is_candidate(&self, path: &Utf8Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

/// Directory order: plain entries before subdirectories, each group by file name
fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn walk_error(root: &Utf8Path, source: walkdir::Error) -> WalkError {
    let path = source
        .path()
        .and_then(Utf8Path::from_path)
        .map_or_else(|| root.to_path_buf(), Utf8Path::to_path_buf);
    WalkError::ReadDir { path, source }
}
