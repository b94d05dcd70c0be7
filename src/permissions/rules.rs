//! Rule values, their sources, and the per-source rule collections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{PermissionMode, is_shell_tool};
use crate::{Error, Result};

/// Where a rule came from. Declaration order is the precedence order used
/// when rules are listed, policy first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleSource {
    PolicySettings,
    UserSettings,
    ProjectSettings,
    LocalSettings,
    CliArg,
    Command,
    Session,
}

impl RuleSource {
    pub const ALL: [RuleSource; 7] = [
        RuleSource::PolicySettings,
        RuleSource::UserSettings,
        RuleSource::ProjectSettings,
        RuleSource::LocalSettings,
        RuleSource::CliArg,
        RuleSource::Command,
        RuleSource::Session,
    ];

    /// Backed by a settings file.
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            RuleSource::PolicySettings
                | RuleSource::UserSettings
                | RuleSource::ProjectSettings
                | RuleSource::LocalSettings
        )
    }

    /// Persisted and writable by this process.
    pub fn is_editable(&self) -> bool {
        self.is_persisted() && !matches!(self, RuleSource::PolicySettings)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSource::PolicySettings => "policySettings",
            RuleSource::UserSettings => "userSettings",
            RuleSource::ProjectSettings => "projectSettings",
            RuleSource::LocalSettings => "localSettings",
            RuleSource::CliArg => "cliArg",
            RuleSource::Command => "command",
            RuleSource::Session => "session",
        }
    }
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleBehavior {
    Allow,
    Deny,
}

impl std::fmt::Display for RuleBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleBehavior::Allow => write!(f, "allow"),
            RuleBehavior::Deny => write!(f, "deny"),
        }
    }
}

/// `Tool`, `Tool(content)` or `Tool(prefix:*)`.
///
/// `Tool()` and `Tool(*)` cover the whole tool. Shell command content is
/// stored with whitespace collapsed so equal commands compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleValue {
    tool_name: String,
    content: Option<String>,
}

impl RuleValue {
    pub fn tool(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            content: None,
        }
    }

    pub fn scoped(tool_name: impl Into<String>, content: impl AsRef<str>) -> Self {
        let tool_name = tool_name.into();
        let content = content.as_ref().trim();
        let content = match content {
            "" | "*" => None,
            c if is_shell_tool(&tool_name) => Some(normalize_command(c)),
            c => Some(c.to_string()),
        };
        Self { tool_name, content }
    }

    pub fn parse(rule: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidRule {
            rule: rule.to_string(),
            message: message.to_string(),
        };

        let trimmed = rule.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty rule"));
        }

        let Some(open) = trimmed.find('(') else {
            if trimmed.contains(')') {
                return Err(invalid("unbalanced parentheses"));
            }
            return Ok(Self::tool(trimmed));
        };

        let tool_name = trimmed[..open].trim();
        if tool_name.is_empty() {
            return Err(invalid("missing tool name"));
        }
        let content = trimmed[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| invalid("content must end with ')'"))?;
        Ok(Self::scoped(tool_name, content))
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Command prefix for `prefix:*` content.
    pub fn prefix(&self) -> Option<&str> {
        self.content.as_deref()?.strip_suffix(":*")
    }
}

impl std::str::FromStr for RuleValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RuleValue {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RuleValue> for String {
    fn from(value: RuleValue) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for RuleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.content {
            Some(content) => write!(f, "{}({})", self.tool_name, content),
            None => write!(f, "{}", self.tool_name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub value: RuleValue,
    pub source: RuleSource,
    pub behavior: RuleBehavior,
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} rule from {})", self.value, self.behavior, self.source)
    }
}

/// One rule to add to a [`RuleSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleUpdate {
    pub value: RuleValue,
    pub source: RuleSource,
    pub behavior: RuleBehavior,
}

impl RuleUpdate {
    pub fn allow(value: RuleValue, source: RuleSource) -> Self {
        Self {
            value,
            source,
            behavior: RuleBehavior::Allow,
        }
    }

    pub fn deny(value: RuleValue, source: RuleSource) -> Self {
        Self {
            value,
            source,
            behavior: RuleBehavior::Deny,
        }
    }
}

/// Allow and deny rules keyed by source, plus the active mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default)]
    pub mode: PermissionMode,

    #[serde(default)]
    pub always_allow: BTreeMap<RuleSource, Vec<RuleValue>>,

    #[serde(default)]
    pub always_deny: BTreeMap<RuleSource, Vec<RuleValue>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: PermissionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn values(&self, behavior: RuleBehavior, source: RuleSource) -> &[RuleValue] {
        self.bucket(behavior)
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Rules of one behavior, in source order then insertion order.
    pub fn rules(&self, behavior: RuleBehavior) -> impl Iterator<Item = Rule> + '_ {
        self.bucket(behavior).iter().flat_map(move |(source, values)| {
            values.iter().map(move |value| Rule {
                value: value.clone(),
                source: *source,
                behavior,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.always_allow
            .values()
            .chain(self.always_deny.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn with_updates(&self, batch: &[RuleUpdate]) -> RuleSet {
        update_rule_sets_with_behaviors(self, batch)
    }

    fn bucket(&self, behavior: RuleBehavior) -> &BTreeMap<RuleSource, Vec<RuleValue>> {
        match behavior {
            RuleBehavior::Allow => &self.always_allow,
            RuleBehavior::Deny => &self.always_deny,
        }
    }
}

/// Returns a copy of `rules` with every update appended to its
/// `(behavior, source)` bucket. Values already present in that bucket are
/// not added twice; the input is left untouched.
pub fn update_rule_sets_with_behaviors(rules: &RuleSet, batch: &[RuleUpdate]) -> RuleSet {
    let mut next = rules.clone();
    for update in batch {
        let bucket = match update.behavior {
            RuleBehavior::Allow => &mut next.always_allow,
            RuleBehavior::Deny => &mut next.always_deny,
        }
        .entry(update.source)
        .or_default();

        if !bucket.contains(&update.value) {
            bucket.push(update.value.clone());
        }
    }
    next
}

/// Collapses runs of whitespace into single spaces.
pub fn normalize_command(command: &str) -> String {
    command.split_whitespace().collect::<Vec<_>>().join(" ")
}
