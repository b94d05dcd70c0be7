//! Static checks on shell commands and the session directory boundary.
//!
//! - [`bash`]: quote-aware lexer, allow-list analyzer and command splitting
//! - [`path`]: path normalization and [`path::SessionBoundary`]
//! - [`guard`]: `cd` containment for a command line

pub mod bash;
pub mod guard;
pub mod path;

mod error;

pub use error::SecurityError;
pub use guard::WorkingDirectoryGuard;
