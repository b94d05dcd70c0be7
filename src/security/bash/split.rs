//! Splits a compound command line into the simple commands it runs.

use tree_sitter::{Language, Node, Parser};

use super::parser::{AstNode, OperatorKind, parse, restore_quotes};

const COMMAND_KINDS: &[&str] = &[
    "command",
    "declaration_command",
    "unset_command",
    "test_command",
];

const REDIRECT_KINDS: &[&str] = &["file_redirect", "heredoc_redirect", "herestring_redirect"];

fn bash_language() -> Language {
    tree_sitter_bash::LANGUAGE.into()
}

/// Returns every simple command in `command`, in source order.
///
/// Redirection clauses are dropped, and commands nested inside substitutions
/// are reported alongside the command that contains them. A line that cannot
/// be parsed comes back whole as a single entry.
pub fn split_command(command: &str) -> Vec<String> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(commands) = split_with_tree_sitter(trimmed) {
        return commands;
    }
    tracing::debug!(command = trimmed, "bash grammar rejected command, using lexer split");

    split_with_lexer(trimmed).unwrap_or_else(|| vec![trimmed.to_string()])
}

fn split_with_tree_sitter(command: &str) -> Option<Vec<String>> {
    let mut parser = Parser::new();
    parser.set_language(&bash_language()).ok()?;
    let tree = parser.parse(command, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let mut stack = vec![root];
    let mut found = Vec::new();
    while let Some(node) = stack.pop() {
        if COMMAND_KINDS.contains(&node.kind()) {
            found.push(node);
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }

    // The stack walk is LIFO; restore source order.
    found.sort_by_key(Node::start_byte);

    Some(
        found
            .into_iter()
            .filter_map(|node| command_text(node, command))
            .collect(),
    )
}

fn command_text(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let parts: Vec<&str> = node
        .children(&mut cursor)
        .filter(|child| !REDIRECT_KINDS.contains(&child.kind()))
        .filter_map(|child| source.get(child.byte_range()))
        .collect();
    let text = parts.join(" ");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn split_with_lexer(command: &str) -> Option<Vec<String>> {
    let nodes = parse(command).ok()?;

    let mut commands = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut skip_target = false;

    for node in &nodes {
        match node {
            AstNode::Literal(text) | AstNode::Operator(OperatorKind::Glob(text)) => {
                if std::mem::take(&mut skip_target) {
                    continue;
                }
                words.push(restore_quotes(text));
            }
            AstNode::Operator(op) if op.is_redirection() => skip_target = true,
            AstNode::Operator(_) => {
                skip_target = false;
                if !words.is_empty() {
                    commands.push(std::mem::take(&mut words).join(" "));
                }
            }
            AstNode::Comment(_) => {}
        }
    }
    if !words.is_empty() {
        commands.push(words.join(" "));
    }
    Some(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_command("ls -la && rm -rf /"), vec!["ls -la", "rm -rf /"]);
        assert_eq!(
            split_command("git status | grep x; npm test || true"),
            vec!["git status", "grep x", "npm test", "true"]
        );
    }

    #[test]
    fn test_split_drops_redirections() {
        assert_eq!(
            split_command("echo hi > /dev/null && cd src"),
            vec!["echo hi", "cd src"]
        );
    }

    #[test]
    fn test_split_keeps_quoting() {
        assert_eq!(split_command(r#"cd "my dir""#), vec![r#"cd "my dir""#]);
    }

    #[test]
    fn test_split_reports_nested_commands() {
        let commands = split_command("echo $(rm -rf /)");
        assert_eq!(commands.first().map(String::as_str), Some("echo $(rm -rf /)"));
        assert!(commands.iter().any(|c| c == "rm -rf /"));
    }

    #[test]
    fn test_split_unparseable_returns_whole_line() {
        assert_eq!(split_command("  echo \"unterminated  "), vec!["echo \"unterminated"]);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_command("   ").is_empty());
    }

    #[test]
    fn test_lexer_split() {
        let commands = split_with_lexer("npm test > /dev/null | tee out; echo 'a b'").unwrap();
        assert_eq!(commands, vec!["npm test", "tee out", "echo 'a b'"]);
    }
}
