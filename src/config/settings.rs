//! Settings JSON files holding permission rules, one file per rule source.
//!
//! Locations:
//! 1. User settings: `$CLAUDE_CONFIG_DIR/settings.json` or `~/.claude/settings.json`
//! 2. Project settings: `.claude/settings.json`
//! 3. Local settings: `.claude/settings.local.json` (not committed)
//! 4. Policy settings: managed path supplied by the caller (read-only)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ConfigError, ConfigResult, home_dir};
use crate::permissions::{PermissionMode, RuleBehavior, RuleSource, RuleUpdate, RuleValue};

/// Overrides the user configuration directory.
pub const CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

const PROJECT_DIR: &str = ".claude";
const SETTINGS_FILE: &str = "settings.json";
const LOCAL_SETTINGS_FILE: &str = "settings.local.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub permissions: PermissionSettings,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    /// Reads a settings file. A missing file is `Ok(None)`; anything else that
    /// goes wrong is an error.
    pub async fn read(path: &Path) -> ConfigResult<Option<Self>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Replaces the file atomically (temp file in the same directory, then rename).
    pub async fn write(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;

        let mut content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        content.push('\n');

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| SETTINGS_FILE.to_string());
        let temp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        tokio::fs::write(&temp, content).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(write_err(e));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionSettings {
    #[serde(default)]
    pub allow: Vec<String>,

    #[serde(default)]
    pub deny: Vec<String>,

    #[serde(
        default,
        rename = "defaultMode",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_mode: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PermissionSettings {
    pub fn is_empty(&self) -> bool {
        self.deny.is_empty() && self.allow.is_empty() && self.default_mode.is_none()
    }

    pub fn mode(&self) -> ConfigResult<Option<PermissionMode>> {
        self.default_mode
            .as_deref()
            .map(|mode| {
                mode.parse::<PermissionMode>()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: "permissions.defaultMode".to_string(),
                        message,
                    })
            })
            .transpose()
    }

    /// Rule updates for every entry, deny rules first.
    pub fn updates(&self, source: RuleSource) -> crate::Result<Vec<RuleUpdate>> {
        let deny = self.deny.iter().map(|v| (v, RuleBehavior::Deny));
        let allow = self.allow.iter().map(|v| (v, RuleBehavior::Allow));
        deny.chain(allow)
            .map(|(value, behavior)| {
                Ok(RuleUpdate {
                    value: RuleValue::parse(value)?,
                    source,
                    behavior,
                })
            })
            .collect()
    }
}

/// Where each persisted rule source lives on disk.
#[derive(Debug, Clone, Default)]
pub struct SettingsPaths {
    user: Option<PathBuf>,
    project: Option<PathBuf>,
    local: Option<PathBuf>,
    policy: Option<PathBuf>,
}

impl SettingsPaths {
    pub fn for_project(project_dir: impl AsRef<Path>) -> Self {
        let dir = project_dir.as_ref().join(PROJECT_DIR);
        Self {
            user: user_settings_path(),
            project: Some(dir.join(SETTINGS_FILE)),
            local: Some(dir.join(LOCAL_SETTINGS_FILE)),
            policy: None,
        }
    }

    pub fn user(mut self, path: impl Into<PathBuf>) -> Self {
        self.user = Some(path.into());
        self
    }

    pub fn without_user(mut self) -> Self {
        self.user = None;
        self
    }

    pub fn policy(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy = Some(path.into());
        self
    }

    pub fn path(&self, source: RuleSource) -> Option<&Path> {
        match source {
            RuleSource::UserSettings => self.user.as_deref(),
            RuleSource::ProjectSettings => self.project.as_deref(),
            RuleSource::LocalSettings => self.local.as_deref(),
            RuleSource::PolicySettings => self.policy.as_deref(),
            RuleSource::CliArg | RuleSource::Command | RuleSource::Session => None,
        }
    }

    /// Sources in load order; later files override `defaultMode`.
    pub fn load_order(&self) -> impl Iterator<Item = (RuleSource, &Path)> {
        [
            RuleSource::UserSettings,
            RuleSource::ProjectSettings,
            RuleSource::LocalSettings,
            RuleSource::PolicySettings,
        ]
        .into_iter()
        .filter_map(|source| self.path(source).map(|path| (source, path)))
    }
}

fn user_settings_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join(SETTINGS_FILE));
    }
    home_dir().map(|home| home.join(PROJECT_DIR).join(SETTINGS_FILE))
}
