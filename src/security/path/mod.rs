//! Path normalization and the session directory boundary.

mod boundary;

pub use boundary::SessionBoundary;

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Turns a candidate path into the form containment checks compare.
pub trait PathNormalizer: Send + Sync {
    fn normalize(&self, path: &Path) -> PathBuf;
}

/// Purely textual: collapses `.` and `..` without touching the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalNormalizer;

impl PathNormalizer for LexicalNormalizer {
    fn normalize(&self, path: &Path) -> PathBuf {
        normalize_path(path)
    }
}

/// Lexical normalization followed by symlink resolution of the deepest
/// existing ancestor. Components that do not exist yet are appended as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalNormalizer;

impl PathNormalizer for CanonicalNormalizer {
    fn normalize(&self, path: &Path) -> PathBuf {
        let lexical = normalize_path(path);
        let mut existing = lexical.as_path();
        let mut missing: Vec<OsString> = Vec::new();

        loop {
            match std::fs::canonicalize(existing) {
                Ok(mut resolved) => {
                    resolved.extend(missing.iter().rev());
                    return resolved;
                }
                Err(_) => match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return lexical,
                },
            }
        }
    }
}

pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            Component::CurDir => {}
            c => components.push(c),
        }
    }

    if components.is_empty() {
        PathBuf::from(".")
    } else {
        components.iter().collect()
    }
}
