//! Prelude module for convenient imports.
//!
//! ```rust
//! use agent_permissions::prelude::*;
//! ```

pub use crate::Error;
pub use crate::Result;

// Decisions
pub use crate::permissions::{
    DecisionReason, PermissionDecision, PermissionEngine, PermissionMode, ToolInvocation, decide,
};

// Rules
pub use crate::permissions::{
    Rule, RuleBehavior, RuleMatcher, RuleSet, RuleSource, RuleUpdate, RuleValue,
};

// Storage
pub use crate::config::SettingsPaths;
pub use crate::permissions::{FileRuleStore, MemoryRuleStore, PermissionStore, RuleStore};

// Shell analysis
pub use crate::security::WorkingDirectoryGuard;
pub use crate::security::bash::{ShellSafetyAnalyzer, parse, split_command};
pub use crate::security::path::SessionBoundary;
