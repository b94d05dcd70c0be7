//! # agent-permissions
//!
//! Permission checks for tool invocations made by an agent, with static
//! safety analysis of shell commands.
//!
//! Every shell command is parsed and checked against a small allow-list of
//! shell constructs before any rule is consulted. A `cd` that would leave the
//! directory the session started in needs explicit confirmation. Deny rules
//! always win over allow rules.
//!
//! ## Quick Start
//!
//! ```rust
//! use agent_permissions::prelude::*;
//!
//! let boundary = SessionBoundary::new("/work/repo").unwrap();
//! let rules = RuleSet::new().with_updates(&[RuleUpdate::allow(
//!     RuleValue::parse("Bash(git:*)").unwrap(),
//!     RuleSource::Session,
//! )]);
//!
//! let decision = decide(&ToolInvocation::shell("git status"), &boundary, &rules);
//! assert!(decision.is_allowed());
//!
//! let decision = decide(&ToolInvocation::shell("git log > log.txt"), &boundary, &rules);
//! assert!(decision.is_denied());
//! ```
//!
//! ## Persisted rules
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agent_permissions::config::SettingsPaths;
//! use agent_permissions::permissions::{FileRuleStore, PermissionStore};
//!
//! # async fn run() -> agent_permissions::Result<()> {
//! let store = FileRuleStore::new(SettingsPaths::for_project("./project"));
//! let permissions = PermissionStore::open(Arc::new(store)).await?;
//! let rules = permissions.snapshot();
//! # let _ = rules;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod permissions;
pub mod prelude;
pub mod security;

pub use config::{ConfigError, SettingsPaths};
pub use permissions::{
    DecisionReason, PermissionDecision, PermissionEngine, PermissionMode, PermissionStore,
    RuleSet, ToolInvocation, decide,
};
pub use security::path::SessionBoundary;

/// The main error type for permission operations.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Settings could not be read, parsed or written.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session directory setup or change was rejected.
    #[error("Security error: {0}")]
    Security(#[from] security::SecurityError),

    /// A rule string is not of the form `Tool` or `Tool(content)`.
    #[error("Invalid permission rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },
}

impl Error {
    pub fn is_invalid_rule(&self) -> bool {
        matches!(self, Error::InvalidRule { .. })
    }
}

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
