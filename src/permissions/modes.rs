//! Permission modes deciding what happens when no rule matches.

use serde::{Deserialize, Serialize};

/// Fallback behavior once the hard shell checks have passed and no
/// always-allow or always-deny rule matched.
///
/// Modes never relax the shell checks or deny rules: an unsafe command or a
/// `cd` out of the session root is handled the same way in every mode.
///
/// ```rust
/// use agent_permissions::permissions::PermissionMode;
///
/// let mode: PermissionMode = "acceptEdits".parse().unwrap();
/// assert!(mode.auto_approves_files());
/// assert!(!mode.allows_all());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Unmatched invocations go to the user.
    #[default]
    Default,

    /// File tools (Read, Write, Edit, ...) are approved; everything else asks.
    AcceptEdits,

    /// Unmatched invocations are approved.
    BypassPermissions,

    /// Read-only tools are approved; everything else is denied.
    Plan,
}

impl PermissionMode {
    pub fn allows_all(&self) -> bool {
        matches!(self, PermissionMode::BypassPermissions)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, PermissionMode::Plan)
    }

    pub fn auto_approves_files(&self) -> bool {
        matches!(self, PermissionMode::AcceptEdits)
    }

    pub fn is_default(&self) -> bool {
        matches!(self, PermissionMode::Default)
    }

    pub fn description(&self) -> &'static str {
        match self {
            PermissionMode::Default => "unmatched tools require confirmation",
            PermissionMode::AcceptEdits => "file operations are approved automatically",
            PermissionMode::BypassPermissions => "unmatched tools are approved",
            PermissionMode::Plan => "only read-only tools may run",
        }
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionMode::Default => write!(f, "default"),
            PermissionMode::AcceptEdits => write!(f, "acceptEdits"),
            PermissionMode::BypassPermissions => write!(f, "bypassPermissions"),
            PermissionMode::Plan => write!(f, "plan"),
        }
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(PermissionMode::Default),
            "acceptedits" | "accept-edits" => Ok(PermissionMode::AcceptEdits),
            "bypasspermissions" | "bypass-permissions" => Ok(PermissionMode::BypassPermissions),
            "plan" => Ok(PermissionMode::Plan),
            _ => Err(format!("unknown permission mode '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        let mode = PermissionMode::default();
        assert!(mode.is_default());
        assert!(!mode.allows_all());
        assert!(!mode.auto_approves_files());
    }

    #[test]
    fn test_mode_predicates() {
        assert!(PermissionMode::AcceptEdits.auto_approves_files());
        assert!(PermissionMode::BypassPermissions.allows_all());
        assert!(PermissionMode::Plan.is_read_only());
        assert!(!PermissionMode::Plan.allows_all());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for mode in [
            PermissionMode::Default,
            PermissionMode::AcceptEdits,
            PermissionMode::BypassPermissions,
            PermissionMode::Plan,
        ] {
            assert_eq!(mode.to_string().parse::<PermissionMode>().unwrap(), mode);
        }
        assert!("readonly".parse::<PermissionMode>().is_err());
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&PermissionMode::BypassPermissions).unwrap();
        assert_eq!(json, "\"bypassPermissions\"");

        let parsed: PermissionMode = serde_json::from_str("\"plan\"").unwrap();
        assert_eq!(parsed, PermissionMode::Plan);
    }
}
