//! WorkingDirectoryGuard: keeps `cd` inside the session's original directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::bash::{AstNode, OperatorKind, parse, split_command, unquote};
use super::path::{LexicalNormalizer, PathNormalizer, SessionBoundary};
use crate::config::home_dir;
use crate::permissions::{DecisionReason, PermissionDecision};

/// Words that run the next word as a builtin or command.
const COMMAND_PREFIXES: &[&str] = &["builtin", "command"];

#[derive(Clone)]
pub struct WorkingDirectoryGuard {
    normalizer: Arc<dyn PathNormalizer>,
}

impl Default for WorkingDirectoryGuard {
    fn default() -> Self {
        Self::new(Arc::new(LexicalNormalizer))
    }
}

impl std::fmt::Debug for WorkingDirectoryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingDirectoryGuard").finish_non_exhaustive()
    }
}

/// How a single simple command moves the shell's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DirectoryChange {
    To(String),
    Home,
    Unverifiable(String),
}

impl WorkingDirectoryGuard {
    pub fn new(normalizer: Arc<dyn PathNormalizer>) -> Self {
        Self { normalizer }
    }

    /// Checks every directory change in `command`. The first target outside
    /// the original directory, or one that cannot be resolved statically,
    /// yields `Ask`.
    pub fn check_cd_commands(
        &self,
        command: &str,
        boundary: &SessionBoundary,
    ) -> PermissionDecision {
        self.check_commands(&split_command(command), boundary)
    }

    /// Sub-commands run in order, so each `cd` resolves against the directory
    /// the previous one left behind.
    pub(crate) fn check_commands(
        &self,
        commands: &[String],
        boundary: &SessionBoundary,
    ) -> PermissionDecision {
        let root = self.normalizer.normalize(boundary.original_dir());
        let mut cwd = boundary.current_dir().to_path_buf();

        for command in commands {
            let raw = match directory_change(command) {
                None => continue,
                Some(DirectoryChange::To(raw)) => raw,
                Some(DirectoryChange::Home) => "~".to_string(),
                Some(DirectoryChange::Unverifiable(target)) => {
                    return unverifiable(target);
                }
            };

            let Some(target) = self.resolve(&raw, &cwd) else {
                return unverifiable(raw);
            };

            if !target.starts_with(&root) {
                tracing::warn!(
                    target = %target.display(),
                    root = %root.display(),
                    "cd leaves the original working directory"
                );
                return PermissionDecision::Ask(DecisionReason::DirectoryEscape { target, root });
            }
            cwd = target;
        }

        PermissionDecision::Allow(DecisionReason::WithinSessionRoot)
    }

    fn resolve(&self, raw: &str, cwd: &Path) -> Option<PathBuf> {
        // `cd -`, options, stack offsets and expansions depend on runtime state.
        if raw.starts_with(['-', '+']) || raw.contains(['$', '`']) {
            return None;
        }

        let path = if raw == "~" || raw.starts_with("~/") {
            home_dir()?.join(raw[1..].trim_start_matches('/'))
        } else if raw.starts_with('~') {
            return None;
        } else {
            cwd.join(raw)
        };

        Some(self.normalizer.normalize(&path))
    }
}

fn unverifiable(target: String) -> PermissionDecision {
    tracing::warn!(target = %target, "cd target cannot be resolved statically");
    PermissionDecision::Ask(DecisionReason::UnverifiableDirectory { target })
}

/// Classifies a simple command. `None` means it leaves the directory alone.
///
/// Leading assignments and `builtin`/`command` prefixes are skipped, and the
/// command word is compared with its quoting and escapes removed, so `\cd`,
/// `"cd"` and `builtin cd` are all recognized.
fn directory_change(command: &str) -> Option<DirectoryChange> {
    let Ok(nodes) = parse(command) else {
        return Some(DirectoryChange::Unverifiable(command.trim().to_string()));
    };

    let words: Vec<String> = nodes
        .iter()
        .map_while(|node| match node {
            AstNode::Literal(text) | AstNode::Operator(OperatorKind::Glob(text)) => {
                Some(unquote(text))
            }
            _ => None,
        })
        .collect();

    let mut rest = words.as_slice();
    let mut cdpath = false;
    while let Some((word, tail)) = rest.split_first() {
        match assignment_name(word) {
            Some(name) => {
                cdpath |= name == "CDPATH";
                rest = tail;
            }
            None => break,
        }
    }
    while let Some((word, tail)) = rest.split_first() {
        if COMMAND_PREFIXES.contains(&word.as_str()) {
            rest = tail;
            while rest.first().is_some_and(|w| w.starts_with('-')) {
                rest = &rest[1..];
            }
        } else {
            break;
        }
    }

    let (name, args) = rest.split_first()?;
    let change = match name.as_str() {
        "cd" | "pushd" if cdpath => DirectoryChange::Unverifiable(command.trim().to_string()),
        "cd" if args.is_empty() => DirectoryChange::Home,
        "cd" | "pushd" if !args.is_empty() => DirectoryChange::To(args.join(" ")),
        "pushd" | "popd" | "eval" => DirectoryChange::Unverifiable(command.trim().to_string()),
        // The command word itself may expand to `cd`.
        n if n.contains(['$', '`']) => DirectoryChange::Unverifiable(command.trim().to_string()),
        _ => return None,
    };
    Some(change)
}

fn assignment_name(word: &str) -> Option<&str> {
    let (name, _) = word.split_once('=')?;
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary() -> SessionBoundary {
        SessionBoundary::with_current_dir("/repo", "/repo/src").unwrap()
    }

    fn check(command: &str) -> PermissionDecision {
        WorkingDirectoryGuard::default().check_cd_commands(command, &boundary())
    }

    fn target_of(command: &str) -> Option<DirectoryChange> {
        directory_change(command)
    }

    #[test]
    fn test_directory_change_target() {
        let to = |s: &str| Some(DirectoryChange::To(s.to_string()));
        assert_eq!(target_of("cd src"), to("src"));
        assert_eq!(target_of(r#"cd "my dir""#), to("my dir"));
        assert_eq!(target_of("cd 'a b'"), to("a b"));
        assert_eq!(target_of(r"cd my\ dir"), to("my dir"));
        assert_eq!(target_of("cd"), Some(DirectoryChange::Home));
        assert_eq!(target_of("ls cd"), None);
        assert_eq!(target_of("cdx foo"), None);
        assert_eq!(target_of("echo $HOME"), None);
    }

    #[test]
    fn test_alternate_cd_spellings() {
        let to_etc = Some(DirectoryChange::To("/etc".to_string()));
        for command in [
            r"\cd /etc",
            r#""cd" /etc"#,
            "'cd' /etc",
            "builtin cd /etc",
            "command cd /etc",
            "command -p cd /etc",
            "FOO=1 cd /etc",
            "A=1 B=2 builtin cd /etc",
            "pushd /etc",
        ] {
            assert_eq!(target_of(command), to_etc, "{command}");
            assert!(check(command).needs_confirmation(), "{command}");
        }
    }

    #[test]
    fn test_runtime_dependent_commands_unverifiable() {
        for command in ["popd", "pushd", "eval cd /etc", "$CMD /etc", "CDPATH=/ cd etc"] {
            assert!(
                matches!(target_of(command), Some(DirectoryChange::Unverifiable(_))),
                "expected unverifiable: {command}"
            );
        }
    }

    #[test]
    fn test_cd_inside_root_allowed() {
        assert!(check("cd lib").is_allowed());
        assert!(check("cd ..").is_allowed());
        assert!(check("cd /repo/docs && ls").is_allowed());
        assert!(check("ls -la").is_allowed());
        assert!(check("FOO=1 make").is_allowed());
    }

    #[test]
    fn test_cd_outside_root_asks() {
        let decision = check("cd ../..");
        assert!(decision.needs_confirmation());
        match decision.reason() {
            DecisionReason::DirectoryEscape { target, root } => {
                assert_eq!(target, Path::new("/"));
                assert_eq!(root, Path::new("/repo"));
            }
            other => panic!("unexpected reason: {other:?}"),
        }
        assert!(
            decision
                .to_string()
                .contains("original working directory (/repo)")
        );
    }

    #[test]
    fn test_chained_cd_resolves_from_previous_target() {
        let decision = check("cd .. && cd ..");
        match decision.reason() {
            DecisionReason::DirectoryEscape { target, .. } => {
                assert_eq!(target, Path::new("/"))
            }
            other => panic!("unexpected reason: {other:?}"),
        }

        assert!(check("cd ..; cd src; cd ../docs").is_allowed());
        assert!(check("cd /repo/docs && cd ../..").needs_confirmation());
    }

    #[test]
    fn test_first_escape_wins() {
        let decision = check("cd lib && cd /etc && cd /tmp");
        match decision.reason() {
            DecisionReason::DirectoryEscape { target, .. } => {
                assert_eq!(target, Path::new("/etc"))
            }
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[test]
    fn test_unverifiable_targets_ask() {
        for command in ["cd -", "cd $HOME", "cd ~root", "cd -P ..", "pushd +1"] {
            assert!(
                matches!(
                    check(command).reason(),
                    DecisionReason::UnverifiableDirectory { .. }
                ),
                "expected unverifiable: {command}"
            );
        }
    }

    #[test]
    fn test_home_outside_root_asks() {
        if home_dir().is_some_and(|home| !home.starts_with("/repo")) {
            assert!(check("cd").needs_confirmation());
            assert!(check("cd ~").needs_confirmation());
            assert!(check("cd ~/projects").needs_confirmation());
        }
    }

    #[test]
    fn test_prefix_sibling_is_outside() {
        assert!(check("cd /repository").needs_confirmation());
    }
}
