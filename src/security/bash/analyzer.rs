//! Allow-list walk over a parsed command.

use super::parser::{AstNode, OperatorKind, restore_quotes};

/// Descriptors `>&` may duplicate onto.
pub const ALLOWED_FILE_DESCRIPTORS: &[&str] = &["0", "1", "2"];

/// The only file `>` may write to.
pub const NULL_DEVICE: &str = "/dev/null";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafeConstruct {
    Comment(String),
    Operator(OperatorKind),
    Redirection {
        operator: OperatorKind,
        target: Option<String>,
    },
}

impl std::fmt::Display for UnsafeConstruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Comment(_) => write!(f, "comment"),
            Self::Operator(op) => write!(f, "operator '{}'", op.symbol()),
            Self::Redirection {
                operator,
                target: Some(target),
            } => write!(f, "redirection '{} {}'", operator.symbol(), target),
            Self::Redirection {
                operator,
                target: None,
            } => write!(f, "redirection '{}' without target", operator.symbol()),
        }
    }
}

pub struct ShellSafetyAnalyzer;

impl ShellSafetyAnalyzer {
    pub fn is_safe(nodes: &[AstNode]) -> bool {
        Self::check(nodes).is_ok()
    }

    /// Returns the first construct outside the allow-list.
    pub fn check(nodes: &[AstNode]) -> Result<(), UnsafeConstruct> {
        for (i, node) in nodes.iter().enumerate() {
            let op = match node {
                AstNode::Literal(_) => continue,
                AstNode::Comment(text) => return Err(UnsafeConstruct::Comment(text.clone())),
                AstNode::Operator(op) => op,
            };
            let target = nodes.get(i + 1).and_then(AstNode::as_literal);

            let allowed = match op {
                OperatorKind::Glob(_) => true,
                OperatorKind::And
                | OperatorKind::Or
                | OperatorKind::Semicolon
                | OperatorKind::CaseTerminator
                | OperatorKind::Pipe => true,
                OperatorKind::DuplicateOutput => {
                    target.is_some_and(|t| ALLOWED_FILE_DESCRIPTORS.contains(&t.trim()))
                }
                OperatorKind::RedirectOutput => target.is_some_and(|t| t.trim() == NULL_DEVICE),
                OperatorKind::PipeWithStderr
                | OperatorKind::Background
                | OperatorKind::Newline
                | OperatorKind::SubshellOpen
                | OperatorKind::SubshellClose
                | OperatorKind::CommandSubstitution
                | OperatorKind::ProcessSubstitution
                | OperatorKind::RedirectAppend
                | OperatorKind::RedirectClobber
                | OperatorKind::RedirectOutputAndError
                | OperatorKind::DuplicateInput
                | OperatorKind::RedirectInput
                | OperatorKind::ReadWrite
                | OperatorKind::HereDoc
                | OperatorKind::HereString => false,
            };

            if !allowed {
                return Err(if op.is_redirection() {
                    UnsafeConstruct::Redirection {
                        operator: op.clone(),
                        target: target.map(restore_quotes),
                    }
                } else {
                    UnsafeConstruct::Operator(op.clone())
                });
            }
        }
        Ok(())
    }
}
