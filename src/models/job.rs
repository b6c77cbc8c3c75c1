use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use thiserror::Error;

/// One of the three inputs supplied by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RootPath,
    SearchText,
    ReplaceText,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::RootPath => "project root",
            Field::SearchText => "search text",
            Field::ReplaceText => "replacement text",
        };
        f.write_str(name)
    }
}

/// Errors reported synchronously, before any file is touched
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing parameter: {0}")]
    EmptyField(Field),

    #[error("Project root {0} does not exist")]
    RootNotFound(Utf8PathBuf),

    #[error("Project root {0} is not a directory")]
    RootNotDirectory(Utf8PathBuf),

    #[error(
        "Specified path does not appear to be a SalesLogix project (missing {marker} in {root})"
    )]
    MissingMarker { root: Utf8PathBuf, marker: String },

    #[error("A relabel run is already in progress")]
    AlreadyRunning,

    #[error("Failed to resolve project root {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Validated inputs of a single relabel run.
///
/// A `Job` can only be built through [`Job::new`], which rejects empty
/// fields, so holders never need to re-check them. The root path is made
/// absolute so the modified-file list reports absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    root: Utf8PathBuf,
    search_text: String,
    replace_text: String,
}

impl Job {
    /// Build a job from raw presentation-layer input.
    ///
    /// # Arguments
    /// * `root` - Project root directory; must exist and be a directory
    /// * `search_text` - Literal text to find; must be non-empty
    /// * `replace_text` - Replacement; must be non-empty unless `allow_empty_replacement`
    /// * `allow_empty_replacement` - Accept an empty replacement text
    ///
    /// The marker file is not checked here; see
    /// [`TaskController::validate`](crate::controller::TaskController::validate).
    pub fn new(
        root: &str,
        search_text: &str,
        replace_text: &str,
        allow_empty_replacement: bool,
    ) -> Result<Self, ValidationError> {
        if root.trim().is_empty() {
            return Err(ValidationError::EmptyField(Field::RootPath));
        }
        if search_text.is_empty() {
            return Err(ValidationError::EmptyField(Field::SearchText));
        }
        if replace_text.is_empty() && !allow_empty_replacement {
            return Err(ValidationError::EmptyField(Field::ReplaceText));
        }

        let root = Utf8Path::new(root.trim());
        if !root.exists() {
            return Err(ValidationError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ValidationError::RootNotDirectory(root.to_path_buf()));
        }
        let root = root
            .canonicalize_utf8()
            .map_err(|source| ValidationError::Io {
                path: root.to_path_buf(),
                source,
            })?;

        Ok(Self {
            root,
            search_text: search_text.to_string(),
            replace_text: replace_text.to_string(),
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn replace_text(&self) -> &str {
        &self.replace_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, String) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_str().unwrap().to_string();
        (dir, path)
    }

    #[test]
    fn test_rejects_empty_fields() {
        let (_dir, root) = temp_root();

        assert!(matches!(
            Job::new("", "a", "b", false),
            Err(ValidationError::EmptyField(Field::RootPath))
        ));
        assert!(matches!(
            Job::new(&root, "", "b", false),
            Err(ValidationError::EmptyField(Field::SearchText))
        ));
        assert!(matches!(
            Job::new(&root, "a", "", false),
            Err(ValidationError::EmptyField(Field::ReplaceText))
        ));
    }

    #[test]
    fn test_empty_replacement_allowed_when_configured() {
        let (_dir, root) = temp_root();
        let job = Job::new(&root, "a", "", true).unwrap();
        assert_eq!(job.replace_text(), "");
    }

    #[test]
    fn test_root_must_exist_and_be_directory() {
        let (dir, root) = temp_root();
        let missing = format!("{}/nope", root);
        assert!(matches!(
            Job::new(&missing, "a", "b", false),
            Err(ValidationError::RootNotFound(_))
        ));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            Job::new(file.to_str().unwrap(), "a", "b", false),
            Err(ValidationError::RootNotDirectory(_))
        ));
    }

    #[test]
    fn test_root_is_absolute() {
        let (_dir, root) = temp_root();
        let job = Job::new(&root, "World", "Universe", false).unwrap();
        assert!(job.root().is_absolute());
        assert_eq!(job.search_text(), "World");
        assert_eq!(job.replace_text(), "Universe");
    }

    #[test]
    fn test_field_display() {
        let err = ValidationError::EmptyField(Field::SearchText);
        assert_eq!(err.to_string(), "Missing parameter: search text");
    }
}
