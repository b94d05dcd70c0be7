use std::path::{Path, PathBuf};

use super::normalize_path;
use crate::security::SecurityError;

/// The directory a session started in, and where it is now.
///
/// `current_dir` always stays inside `original_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBoundary {
    original_dir: PathBuf,
    current_dir: PathBuf,
}

impl SessionBoundary {
    pub fn new(original_dir: impl Into<PathBuf>) -> Result<Self, SecurityError> {
        let original_dir = absolute(original_dir.into())?;
        Ok(Self {
            current_dir: original_dir.clone(),
            original_dir,
        })
    }

    pub fn with_current_dir(
        original_dir: impl Into<PathBuf>,
        current_dir: impl Into<PathBuf>,
    ) -> Result<Self, SecurityError> {
        let mut boundary = Self::new(original_dir)?;
        let current_dir = absolute(current_dir.into())?;
        boundary.change_dir(&current_dir)?;
        Ok(boundary)
    }

    pub fn original_dir(&self) -> &Path {
        &self.original_dir
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// Lexical containment check against the original directory.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        normalize_path(&self.current_dir.join(path)).starts_with(&self.original_dir)
    }

    /// Moves the current directory after a `cd` actually ran.
    pub fn change_dir(&mut self, target: impl AsRef<Path>) -> Result<&Path, SecurityError> {
        let resolved = normalize_path(&self.current_dir.join(target));
        if !resolved.starts_with(&self.original_dir) {
            return Err(SecurityError::PathEscape {
                path: resolved,
                root: self.original_dir.clone(),
            });
        }
        tracing::debug!(from = %self.current_dir.display(), to = %resolved.display(), "session directory changed");
        self.current_dir = resolved;
        Ok(&self.current_dir)
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf, SecurityError> {
    if path.is_absolute() {
        Ok(normalize_path(&path))
    } else {
        Err(SecurityError::RelativePath(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_absolute() {
        assert!(matches!(
            SessionBoundary::new("relative/dir"),
            Err(SecurityError::RelativePath(_))
        ));
        let boundary = SessionBoundary::new("/repo/./src/..").unwrap();
        assert_eq!(boundary.original_dir(), Path::new("/repo"));
        assert_eq!(boundary.current_dir(), Path::new("/repo"));
    }

    #[test]
    fn test_with_current_dir_must_be_inside() {
        let boundary = SessionBoundary::with_current_dir("/repo", "/repo/src").unwrap();
        assert_eq!(boundary.current_dir(), Path::new("/repo/src"));
        assert!(SessionBoundary::with_current_dir("/repo", "/tmp").is_err());
    }

    #[test]
    fn test_contains() {
        let boundary = SessionBoundary::with_current_dir("/repo", "/repo/src").unwrap();
        assert!(boundary.contains("lib"));
        assert!(boundary.contains(".."));
        assert!(!boundary.contains("../.."));
        assert!(!boundary.contains("/etc"));
        assert!(!boundary.contains("/repository"));
    }

    #[test]
    fn test_change_dir() {
        let mut boundary = SessionBoundary::new("/repo").unwrap();
        boundary.change_dir("src/bin").unwrap();
        assert_eq!(boundary.current_dir(), Path::new("/repo/src/bin"));

        let err = boundary.change_dir("../../..").unwrap_err();
        assert!(matches!(err, SecurityError::PathEscape { .. }));
        assert_eq!(boundary.current_dir(), Path::new("/repo/src/bin"));
    }
}
