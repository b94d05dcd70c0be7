//! The outcome of a permission check and why it was reached.

use std::path::PathBuf;

use super::{PermissionMode, Rule, RuleBehavior};
use crate::security::bash::{ParseError, UnsafeConstruct};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionReason {
    /// The shell tool was invoked without a `command` string.
    MissingCommand,
    UnparseableCommand {
        command: String,
        error: ParseError,
    },
    DisallowedConstruct {
        command: String,
        construct: UnsafeConstruct,
    },
    DirectoryEscape {
        target: PathBuf,
        root: PathBuf,
    },
    UnverifiableDirectory {
        target: String,
    },
    WithinSessionRoot,
    Rule(Rule),
    Mode(PermissionMode),
    NoMatchingRule,
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCommand => write!(f, "shell invocation has no command"),
            Self::UnparseableCommand { command, error } => {
                write!(f, "command '{}' could not be parsed: {}", command, error)
            }
            Self::DisallowedConstruct { construct, .. } => {
                write!(f, "disallowed shell construct: {}", construct)
            }
            Self::DirectoryEscape { target, root } => write!(
                f,
                "cd to '{}' was blocked. For security, only directories under the \
                 original working directory ({}) may be entered in this session",
                target.display(),
                root.display()
            ),
            Self::UnverifiableDirectory { target } => write!(
                f,
                "cd to '{}' cannot be checked against the original working directory",
                target
            ),
            Self::WithinSessionRoot => write!(f, "all directory changes stay in the session root"),
            Self::Rule(rule) => match rule.behavior {
                RuleBehavior::Allow => write!(f, "allowed by rule {}", rule),
                RuleBehavior::Deny => write!(f, "denied by rule {}", rule),
            },
            Self::Mode(mode) => write!(f, "{} mode: {}", mode, mode.description()),
            Self::NoMatchingRule => write!(f, "no rule matches; confirmation required"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow(DecisionReason),
    Ask(DecisionReason),
    Deny(DecisionReason),
}

impl PermissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    pub fn needs_confirmation(&self) -> bool {
        matches!(self, Self::Ask(_))
    }

    pub fn reason(&self) -> &DecisionReason {
        match self {
            Self::Allow(reason) | Self::Ask(reason) | Self::Deny(reason) => reason,
        }
    }

    pub fn behavior(&self) -> &'static str {
        match self {
            Self::Allow(_) => "allow",
            Self::Ask(_) => "ask",
            Self::Deny(_) => "deny",
        }
    }
}

impl std::fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{RuleSource, RuleValue};

    #[test]
    fn test_decision_predicates() {
        let allow = PermissionDecision::Allow(DecisionReason::WithinSessionRoot);
        assert!(allow.is_allowed());
        assert_eq!(allow.behavior(), "allow");

        let ask = PermissionDecision::Ask(DecisionReason::NoMatchingRule);
        assert!(ask.needs_confirmation());
        assert!(!ask.is_denied());

        let deny = PermissionDecision::Deny(DecisionReason::MissingCommand);
        assert!(deny.is_denied());
        assert_eq!(deny.reason(), &DecisionReason::MissingCommand);
    }

    #[test]
    fn test_rule_reason_message() {
        let reason = DecisionReason::Rule(Rule {
            value: RuleValue::scoped("Bash", "rm:*"),
            source: RuleSource::UserSettings,
            behavior: RuleBehavior::Deny,
        });
        assert_eq!(
            reason.to_string(),
            "denied by rule Bash(rm:*) (deny rule from userSettings)"
        );
    }

    #[test]
    fn test_escape_message_names_root() {
        let reason = DecisionReason::DirectoryEscape {
            target: PathBuf::from("/etc"),
            root: PathBuf::from("/repo"),
        };
        let message = reason.to_string();
        assert!(message.starts_with("cd to '/etc' was blocked"));
        assert!(message.contains("(/repo)"));
    }
}
