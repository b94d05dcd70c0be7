//! The permission decision pipeline.

use std::sync::Arc;

use super::{
    DecisionReason, PermissionDecision, PermissionMode, RuleMatcher, RuleSet, ToolInvocation,
    is_file_tool, is_read_only_tool, is_shell_tool,
};
use crate::security::WorkingDirectoryGuard;
use crate::security::bash::{ShellSafetyAnalyzer, parse, split_command};
use crate::security::path::{PathNormalizer, SessionBoundary};

/// Decides whether a tool invocation may run.
///
/// Shell commands go through the hard checks first, in order: the whole
/// line must parse, must pass the safety allow-list, every sub-command
/// must parse on its own, and no `cd` may leave the session root. Only then
/// are deny rules, allow rules and the permission mode consulted.
///
/// ```rust
/// use agent_permissions::permissions::{PermissionEngine, RuleSet, ToolInvocation};
/// use agent_permissions::security::path::SessionBoundary;
///
/// let engine = PermissionEngine::new();
/// let boundary = SessionBoundary::new("/repo").unwrap();
/// let decision = engine.decide(
///     &ToolInvocation::shell("echo hi > out.txt"),
///     &boundary,
///     &RuleSet::new(),
/// );
/// assert!(decision.is_denied());
/// ```
#[derive(Clone, Debug, Default)]
pub struct PermissionEngine {
    guard: WorkingDirectoryGuard,
}

impl PermissionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalizer(normalizer: Arc<dyn PathNormalizer>) -> Self {
        Self {
            guard: WorkingDirectoryGuard::new(normalizer),
        }
    }

    pub fn decide(
        &self,
        invocation: &ToolInvocation,
        boundary: &SessionBoundary,
        rules: &RuleSet,
    ) -> PermissionDecision {
        let decision = self.evaluate(invocation, boundary, rules);
        tracing::debug!(
            tool = invocation.tool_name(),
            decision = decision.behavior(),
            reason = %decision.reason(),
            "permission decided"
        );
        decision
    }

    fn evaluate(
        &self,
        invocation: &ToolInvocation,
        boundary: &SessionBoundary,
        rules: &RuleSet,
    ) -> PermissionDecision {
        if is_shell_tool(invocation.tool_name()) {
            let Some(command) = invocation.command() else {
                return PermissionDecision::Deny(DecisionReason::MissingCommand);
            };
            if let Some(decision) = self.check_shell(command, boundary) {
                return decision;
            }
        }

        if let Some(rule) = RuleMatcher::find_deny_match(invocation, rules) {
            return PermissionDecision::Deny(DecisionReason::Rule(rule));
        }
        if let Some(rule) = RuleMatcher::find_allow_match(invocation, rules) {
            return PermissionDecision::Allow(DecisionReason::Rule(rule));
        }

        mode_default(invocation.tool_name(), rules.mode)
    }

    /// Hard checks; `None` means the command may proceed to rule matching.
    fn check_shell(&self, command: &str, boundary: &SessionBoundary) -> Option<PermissionDecision> {
        let nodes = match parse(command) {
            Ok(nodes) => nodes,
            Err(error) => {
                tracing::warn!(command, %error, "rejecting unparseable command");
                return Some(PermissionDecision::Deny(
                    DecisionReason::UnparseableCommand {
                        command: command.to_string(),
                        error,
                    },
                ));
            }
        };

        if let Err(construct) = ShellSafetyAnalyzer::check(&nodes) {
            tracing::warn!(command, %construct, "rejecting unsafe command");
            return Some(PermissionDecision::Deny(
                DecisionReason::DisallowedConstruct {
                    command: command.to_string(),
                    construct,
                },
            ));
        }

        let commands = split_command(command);
        for sub in &commands {
            if let Err(error) = parse(sub) {
                tracing::warn!(command = %sub, %error, "rejecting unparseable sub-command");
                return Some(PermissionDecision::Deny(
                    DecisionReason::UnparseableCommand {
                        command: sub.clone(),
                        error,
                    },
                ));
            }
        }

        match self.guard.check_commands(&commands, boundary) {
            PermissionDecision::Allow(_) => None,
            decision => Some(decision),
        }
    }
}

fn mode_default(tool_name: &str, mode: PermissionMode) -> PermissionDecision {
    match mode {
        PermissionMode::BypassPermissions => PermissionDecision::Allow(DecisionReason::Mode(mode)),
        PermissionMode::AcceptEdits if is_file_tool(tool_name) => {
            PermissionDecision::Allow(DecisionReason::Mode(mode))
        }
        PermissionMode::Plan if is_read_only_tool(tool_name) => {
            PermissionDecision::Allow(DecisionReason::Mode(mode))
        }
        PermissionMode::Plan => PermissionDecision::Deny(DecisionReason::Mode(mode)),
        PermissionMode::Default | PermissionMode::AcceptEdits => {
            PermissionDecision::Ask(DecisionReason::NoMatchingRule)
        }
    }
}

/// [`PermissionEngine::decide`] with the lexical path normalizer.
pub fn decide(
    invocation: &ToolInvocation,
    boundary: &SessionBoundary,
    rules: &RuleSet,
) -> PermissionDecision {
    PermissionEngine::default().decide(invocation, boundary, rules)
}
