//! Matching tool invocations against allow and deny rules.

use std::path::Path;

use glob::{MatchOptions, Pattern};
use serde_json::{Value, json};
use url::Url;

use super::rules::normalize_command;
use super::{Rule, RuleBehavior, RuleSet, RuleValue, SHELL_TOOL, is_file_tool, is_shell_tool};
use crate::security::bash::split_command;
use crate::security::path::normalize_path;

const PATH_FIELDS: &[&str] = &["file_path", "notebook_path", "path"];
const WEB_FETCH_TOOL: &str = "WebFetch";
const DOMAIN_PREFIX: &str = "domain:";

/// A tool name plus its JSON input.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolInvocation {
    tool_name: String,
    input: Value,
}

impl ToolInvocation {
    pub fn new(tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            input,
        }
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Self::new(SHELL_TOOL, json!({ "command": command.into() }))
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    /// The command string of a shell invocation.
    pub fn command(&self) -> Option<&str> {
        if !is_shell_tool(&self.tool_name) {
            return None;
        }
        self.input.get("command")?.as_str()
    }

    /// What scoped rule content is compared against: the normalized command
    /// for shell tools, `domain:<host>` for WebFetch, otherwise the first
    /// path-like field with `.` and `..` collapsed.
    pub fn signature(&self) -> Option<String> {
        if is_shell_tool(&self.tool_name) {
            return self.command().map(normalize_command);
        }
        if self.tool_name == WEB_FETCH_TOOL {
            let url = Url::parse(self.input.get("url")?.as_str()?).ok()?;
            return Some(format!("{}{}", DOMAIN_PREFIX, url.host_str()?.to_ascii_lowercase()));
        }
        PATH_FIELDS
            .iter()
            .find_map(|field| self.input.get(*field).and_then(Value::as_str))
            .map(normalize_path_text)
    }
}

/// Precomputed view of an invocation used while scanning rules.
struct Subject<'a> {
    tool_name: &'a str,
    shell: bool,
    signature: Option<String>,
    commands: Vec<String>,
}

impl<'a> Subject<'a> {
    fn of(invocation: &'a ToolInvocation) -> Self {
        let shell = is_shell_tool(invocation.tool_name());
        let commands = match invocation.command() {
            Some(command) if shell => split_command(command)
                .iter()
                .map(|c| normalize_command(c))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            tool_name: invocation.tool_name(),
            shell,
            signature: invocation.signature(),
            commands,
        }
    }

    fn same_tool(&self, value: &RuleValue) -> bool {
        value.tool_name() == self.tool_name
    }

    /// Whole-invocation match. Prefix rules on shell commands only apply per
    /// sub-command so `git:*` never covers `git status && rm -rf /`.
    fn matches_whole(&self, value: &RuleValue) -> bool {
        if !self.same_tool(value) {
            return false;
        }
        let Some(content) = value.content() else {
            return true;
        };
        let Some(signature) = self.signature.as_deref() else {
            return false;
        };

        if self.shell {
            value.prefix().is_none() && content == signature
        } else if self.tool_name == WEB_FETCH_TOOL {
            domain_matches(content, signature)
        } else if is_file_tool(self.tool_name) {
            path_matches(content, signature)
        } else {
            content == signature
        }
    }

    fn matches_command(&self, value: &RuleValue, command: &str) -> bool {
        self.same_tool(value) && value.content().is_none_or(|c| command_matches(value, c, command))
    }

    fn matches_any_part(&self, value: &RuleValue) -> bool {
        self.commands.iter().any(|c| self.matches_command(value, c))
    }
}

pub struct RuleMatcher;

impl RuleMatcher {
    /// First deny rule matching the invocation or any of its sub-commands.
    pub fn find_deny_match(invocation: &ToolInvocation, rules: &RuleSet) -> Option<Rule> {
        let subject = Subject::of(invocation);
        rules.rules(RuleBehavior::Deny).find(|rule| {
            subject.matches_whole(&rule.value) || subject.matches_any_part(&rule.value)
        })
    }

    /// Allow rule covering the invocation. For compound shell commands every
    /// sub-command must be covered; the rule for the first one is returned.
    pub fn find_allow_match(invocation: &ToolInvocation, rules: &RuleSet) -> Option<Rule> {
        let subject = Subject::of(invocation);

        if let Some(rule) = rules
            .rules(RuleBehavior::Allow)
            .find(|rule| subject.matches_whole(&rule.value))
        {
            return Some(rule);
        }

        let mut first = None;
        for command in &subject.commands {
            let rule = rules
                .rules(RuleBehavior::Allow)
                .find(|rule| subject.matches_command(&rule.value, command))?;
            first.get_or_insert(rule);
        }
        first
    }
}

fn command_matches(value: &RuleValue, content: &str, command: &str) -> bool {
    match value.prefix() {
        Some(prefix) => {
            command == prefix
                || command
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with(' '))
        }
        None => command == content,
    }
}

fn domain_matches(content: &str, signature: &str) -> bool {
    let (Some(domain), Some(host)) = (
        content.strip_prefix(DOMAIN_PREFIX),
        signature.strip_prefix(DOMAIN_PREFIX),
    ) else {
        return content == signature;
    };
    let domain = domain.to_ascii_lowercase();
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|sub| sub.ends_with('.'))
}

/// `*` and `?` stay within one path component; `**` crosses them.
const PATH_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn path_matches(content: &str, path: &str) -> bool {
    let content = normalize_path_text(content);
    if content == path {
        return true;
    }
    if Pattern::new(&content).is_ok_and(|p| p.matches_with(path, PATH_MATCH)) {
        return true;
    }
    let dir = content.trim_end_matches('/');
    !dir.is_empty()
        && path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn normalize_path_text(path: &str) -> String {
    normalize_path(Path::new(path)).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{RuleSource, RuleUpdate};

    fn rules(allow: &[&str], deny: &[&str]) -> RuleSet {
        let mut batch = Vec::new();
        for rule in allow {
            batch.push(RuleUpdate::allow(
                RuleValue::parse(rule).unwrap(),
                RuleSource::Session,
            ));
        }
        for rule in deny {
            batch.push(RuleUpdate::deny(
                RuleValue::parse(rule).unwrap(),
                RuleSource::UserSettings,
            ));
        }
        RuleSet::new().with_updates(&batch)
    }

    fn allowed(command: &str, rules: &RuleSet) -> Option<String> {
        RuleMatcher::find_allow_match(&ToolInvocation::shell(command), rules)
            .map(|r| r.value.to_string())
    }

    #[test]
    fn test_signature() {
        assert_eq!(
            ToolInvocation::shell("git   status").signature().as_deref(),
            Some("git status")
        );
        let fetch = ToolInvocation::new("WebFetch", json!({"url": "https://Docs.RS/tokio"}));
        assert_eq!(fetch.signature().as_deref(), Some("domain:docs.rs"));
        let read = ToolInvocation::new("Read", json!({"file_path": "/repo/src/lib.rs"}));
        assert_eq!(read.signature().as_deref(), Some("/repo/src/lib.rs"));
        assert_eq!(read.command(), None);
    }

    #[test]
    fn test_exact_and_prefix_allow() {
        let rules = rules(&["Bash(npm test)", "Bash(git:*)"], &[]);
        assert_eq!(allowed("npm test", &rules).as_deref(), Some("Bash(npm test)"));
        assert_eq!(allowed("npm  test", &rules).as_deref(), Some("Bash(npm test)"));
        assert_eq!(allowed("git", &rules).as_deref(), Some("Bash(git:*)"));
        assert_eq!(allowed("git status", &rules).as_deref(), Some("Bash(git:*)"));
        assert_eq!(allowed("gitk", &rules), None);
        assert_eq!(allowed("npm test --watch", &rules), None);
    }

    #[test]
    fn test_compound_requires_every_part() {
        let rules = rules(&["Bash(git:*)", "Bash(npm test)"], &[]);
        assert_eq!(
            allowed("git status && npm test", &rules).as_deref(),
            Some("Bash(git:*)")
        );
        assert_eq!(allowed("git status && rm -rf /", &rules), None);
    }

    #[test]
    fn test_redirection_does_not_hide_command() {
        let rules = rules(&["Bash(npm test)"], &[]);
        assert_eq!(
            allowed("npm test > /dev/null", &rules).as_deref(),
            Some("Bash(npm test)")
        );
    }

    #[test]
    fn test_whole_tool_rule() {
        let rules = rules(&["Bash"], &[]);
        assert_eq!(allowed("anything at all", &rules).as_deref(), Some("Bash"));
    }

    #[test]
    fn test_deny_matches_any_part() {
        let rules = rules(&[], &["Bash(rm:*)"]);
        let hit = RuleMatcher::find_deny_match(&ToolInvocation::shell("ls && rm -rf /"), &rules);
        assert_eq!(hit.map(|r| r.source), Some(RuleSource::UserSettings));
        assert!(RuleMatcher::find_deny_match(&ToolInvocation::shell("ls"), &rules).is_none());
    }

    #[test]
    fn test_other_tool_rules_ignored() {
        let rules = rules(&["Read"], &["Write"]);
        assert_eq!(allowed("cat file", &rules), None);
        assert!(RuleMatcher::find_deny_match(&ToolInvocation::shell("cat"), &rules).is_none());
    }

    #[test]
    fn test_path_rules() {
        let rules = rules(&["Read(/repo/src)", "Edit(/repo/**/*.md)"], &[]);
        let read = ToolInvocation::new("Read", json!({"file_path": "/repo/src/lib.rs"}));
        assert!(RuleMatcher::find_allow_match(&read, &rules).is_some());

        let sibling = ToolInvocation::new("Read", json!({"file_path": "/repo/srcx/lib.rs"}));
        assert!(RuleMatcher::find_allow_match(&sibling, &rules).is_none());

        let edit = ToolInvocation::new("Edit", json!({"file_path": "/repo/docs/guide.md"}));
        assert!(RuleMatcher::find_allow_match(&edit, &rules).is_some());
    }

    #[test]
    fn test_path_traversal_is_normalized() {
        let rules = rules(&["Read(/repo/src)"], &["Read(/etc/**)"]);
        let escape = ToolInvocation::new(
            "Read",
            json!({"file_path": "/repo/src/../../etc/shadow"}),
        );
        assert_eq!(escape.signature().as_deref(), Some("/etc/shadow"));
        assert!(RuleMatcher::find_deny_match(&escape, &rules).is_some());
        assert!(RuleMatcher::find_allow_match(&escape, &rules).is_none());

        let inside = ToolInvocation::new("Read", json!({"file_path": "/repo/src/./a/../lib.rs"}));
        assert!(RuleMatcher::find_allow_match(&inside, &rules).is_some());
    }

    #[test]
    fn test_single_star_stays_in_directory() {
        let rules = rules(&["Edit(/repo/*.md)"], &[]);
        let edit = |path: &str| ToolInvocation::new("Edit", json!({ "file_path": path }));
        assert!(RuleMatcher::find_allow_match(&edit("/repo/README.md"), &rules).is_some());
        assert!(RuleMatcher::find_allow_match(&edit("/repo/a/b/c.md"), &rules).is_none());
    }

    #[test]
    fn test_domain_rules() {
        let rules = rules(&["WebFetch(domain:rust-lang.org)"], &[]);
        let fetch = |url: &str| ToolInvocation::new("WebFetch", json!({ "url": url }));
        assert!(RuleMatcher::find_allow_match(&fetch("https://rust-lang.org/learn"), &rules).is_some());
        assert!(RuleMatcher::find_allow_match(&fetch("https://doc.rust-lang.org/std"), &rules).is_some());
        assert!(RuleMatcher::find_allow_match(&fetch("https://evilrust-lang.org"), &rules).is_none());
        assert!(RuleMatcher::find_allow_match(&fetch("not a url"), &rules).is_none());
    }
}
