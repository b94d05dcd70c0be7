//! Permission rules, matching and the decision engine.

mod decision;
mod engine;
mod matcher;
mod modes;
mod rules;
mod store;

pub use decision::{DecisionReason, PermissionDecision};
pub use engine::{PermissionEngine, decide};
pub use matcher::{RuleMatcher, ToolInvocation};
pub use modes::PermissionMode;
pub use rules::{
    Rule, RuleBehavior, RuleSet, RuleSource, RuleUpdate, RuleValue, normalize_command,
    update_rule_sets_with_behaviors,
};
pub use store::{FileRuleStore, MemoryRuleStore, PermissionStore, RuleStore};

pub const SHELL_TOOL: &str = "Bash";

pub const READ_ONLY_TOOLS: &[&str] = &[
    "Read",
    "Glob",
    "Grep",
    "LS",
    "NotebookRead",
    "WebSearch",
    "WebFetch",
];
pub const FILE_TOOLS: &[&str] = &[
    "Read",
    "Write",
    "Edit",
    "MultiEdit",
    "Glob",
    "Grep",
    "LS",
    "NotebookRead",
    "NotebookEdit",
];
pub const SHELL_TOOLS: &[&str] = &[SHELL_TOOL];

pub fn is_read_only_tool(tool_name: &str) -> bool {
    READ_ONLY_TOOLS.contains(&tool_name)
}

pub fn is_file_tool(tool_name: &str) -> bool {
    FILE_TOOLS.contains(&tool_name)
}

pub fn is_shell_tool(tool_name: &str) -> bool {
    SHELL_TOOLS.contains(&tool_name)
}
