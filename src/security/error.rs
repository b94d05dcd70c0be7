//! Security error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("path escapes session root {}: {}", root.display(), path.display())]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("session directory must be absolute: {}", .0.display())]
    RelativePath(PathBuf),
}
