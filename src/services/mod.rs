//! Services module - Pure business logic for relabel operations.
//!
//! This module contains the traversal-and-transform engine. The services are
//! **framework-agnostic** and have no dependencies on the presentation layer or on
//! the application state, making them testable and reusable.
//!
//! # Components
//!
//! - [`ResxRewriter`]: Relabels a single resource file. Handles:
//!   - Streaming the XML document and selecting plain string `<data>` entries
//!   - Literal substring replacement in their `<value>` text
//!   - Change detection, so untouched files are never rewritten
//!   - Replacing the file through a temp file and rename
//!
//! - [`TreeWalker`]: Walks a project tree and feeds every `.resx` file to the rewriter,
//!   collecting the modified-file list in visit order and honouring a [`CancelFlag`]
//!   between files and directories.
//!
//! # Design Philosophy
//!
//! The services layer is designed to be:
//! - **Synchronous**: Plain blocking file I/O; the controller moves it off the caller's thread
//! - **Sequential**: One file at a time, in visit order
//! - **Fail-fast**: The first unreadable or malformed file aborts the walk
//!
//! # Usage Example
//!
//! ```ignore
//! use slx_relabel::services::{CancelFlag, TreeWalker};
//!
//! let walker = TreeWalker::from_settings(&settings);
//! let cancel = CancelFlag::new();
//!
//! let report = walker.walk(root, "Account", "Customer", &cancel)?;
//! for path in &report.modified {
//!     println!("{}", path);
//! }
//! ```

pub mod rewriter;
pub mod walker;

pub use rewriter::{DocumentError, Relabeled, ResxRewriter, RewriteError, replace_literal};
pub use walker::{CancelFlag, TreeWalker, WalkError, WalkEvent, WalkReport};
