//! Rule persistence and the shared, versioned rule snapshot.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, watch};

use super::{RuleBehavior, RuleSet, RuleSource, RuleUpdate, update_rule_sets_with_behaviors};
use crate::Result;
use crate::config::{ConfigError, Settings, SettingsPaths};

#[async_trait::async_trait]
pub trait RuleStore: Send + Sync {
    async fn load(&self) -> Result<RuleSet>;

    /// Persists every source this store owns, replacing what was there.
    async fn save(&self, rules: &RuleSet) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: RwLock<RuleSet>,
}

impl MemoryRuleStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }
}

#[async_trait::async_trait]
impl RuleStore for MemoryRuleStore {
    async fn load(&self) -> Result<RuleSet> {
        Ok(self.rules.read().await.clone())
    }

    async fn save(&self, rules: &RuleSet) -> Result<()> {
        *self.rules.write().await = rules.clone();
        Ok(())
    }
}

/// Rules stored in the `permissions` block of settings.json files.
#[derive(Debug, Clone)]
pub struct FileRuleStore {
    paths: SettingsPaths,
}

impl FileRuleStore {
    pub fn new(paths: SettingsPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &SettingsPaths {
        &self.paths
    }
}

#[async_trait::async_trait]
impl RuleStore for FileRuleStore {
    async fn load(&self) -> Result<RuleSet> {
        let mut rules = RuleSet::new();

        for (source, path) in self.paths.load_order() {
            let Some(settings) = Settings::read(path).await? else {
                continue;
            };
            let batch = settings.permissions.updates(source)?;
            rules = rules.with_updates(&batch);
            if let Some(mode) = settings.permissions.mode()? {
                rules.mode = mode;
            }
            tracing::debug!(
                source = %source,
                path = %path.display(),
                rules = batch.len(),
                "loaded permission rules"
            );
        }

        Ok(rules)
    }

    async fn save(&self, rules: &RuleSet) -> Result<()> {
        for source in RuleSource::ALL.into_iter().filter(RuleSource::is_editable) {
            let Some(path) = self.paths.path(source) else {
                continue;
            };
            let allow = rules.values(RuleBehavior::Allow, source);
            let deny = rules.values(RuleBehavior::Deny, source);

            let existing = Settings::read(path).await?;
            if existing.is_none() && allow.is_empty() && deny.is_empty() {
                continue;
            }

            let mut settings = existing.unwrap_or_default();
            settings.permissions.allow = allow.iter().map(ToString::to_string).collect();
            settings.permissions.deny = deny.iter().map(ToString::to_string).collect();
            settings.write(path).await?;

            tracing::info!(
                source = %source,
                path = %path.display(),
                allow = allow.len(),
                deny = deny.len(),
                "saved permission rules"
            );
        }

        Ok(())
    }
}

/// The live rule set shared by concurrent permission checks.
///
/// Readers take cheap snapshots; writers are serialized so each batch is
/// applied to the latest state and persisted before it is published.
pub struct PermissionStore {
    store: Arc<dyn RuleStore>,
    snapshot: watch::Sender<Arc<RuleSet>>,
    writer: Mutex<()>,
}

impl PermissionStore {
    pub async fn open(store: Arc<dyn RuleStore>) -> Result<Self> {
        let rules = store.load().await?;
        tracing::info!(rules = rules.len(), mode = %rules.mode, "permission rules loaded");
        Ok(Self {
            store,
            snapshot: watch::Sender::new(Arc::new(rules)),
            writer: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.snapshot.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RuleSet>> {
        self.snapshot.subscribe()
    }

    /// Adds a batch of rules and returns the resulting snapshot.
    ///
    /// Updates aimed at policy settings are rejected; those files are owned
    /// by whoever manages the machine.
    pub async fn apply(&self, batch: &[RuleUpdate]) -> Result<Arc<RuleSet>> {
        if let Some(update) = batch
            .iter()
            .find(|u| u.source == RuleSource::PolicySettings)
        {
            return Err(ConfigError::ReadOnly {
                origin: update.source,
            }
            .into());
        }

        let _guard = self.writer.lock().await;
        let next = Arc::new(update_rule_sets_with_behaviors(&self.snapshot(), batch));

        if batch.iter().any(|u| u.source.is_editable()) {
            self.store.save(&next).await?;
        }
        self.snapshot.send_replace(Arc::clone(&next));

        tracing::debug!(added = batch.len(), total = next.len(), "permission rules updated");
        Ok(next)
    }

    /// Re-reads the backing store, dropping rules that were never persisted.
    pub async fn reload(&self) -> Result<Arc<RuleSet>> {
        let _guard = self.writer.lock().await;
        let next = Arc::new(self.store.load().await?);
        self.snapshot.send_replace(Arc::clone(&next));
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{PermissionMode, RuleValue};

    fn update(rule: &str, source: RuleSource) -> RuleUpdate {
        RuleUpdate::allow(RuleValue::parse(rule).unwrap(), source)
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryRuleStore::default();
        let rules = RuleSet::with_mode(PermissionMode::Plan)
            .with_updates(&[update("Bash(ls)", RuleSource::Session)]);
        store.save(&rules).await.unwrap();
        assert_eq!(store.load().await.unwrap(), rules);
    }

    #[tokio::test]
    async fn test_apply_publishes_snapshot() {
        let store = PermissionStore::open(Arc::new(MemoryRuleStore::default()))
            .await
            .unwrap();
        let mut updates = store.subscribe();

        store
            .apply(&[update("Bash(git:*)", RuleSource::Session)])
            .await
            .unwrap();

        assert!(updates.has_changed().unwrap());
        let latest = updates.borrow_and_update().clone();
        assert_eq!(latest.len(), 1);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_rejects_policy_updates() {
        let store = PermissionStore::open(Arc::new(MemoryRuleStore::default()))
            .await
            .unwrap();
        let result = store
            .apply(&[update("Bash", RuleSource::PolicySettings)])
            .await;
        assert!(result.is_err());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_applies_keep_every_rule() {
        let store = Arc::new(
            PermissionStore::open(Arc::new(MemoryRuleStore::default()))
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .apply(&[update(&format!("Bash(task-{i})"), RuleSource::LocalSettings)])
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.snapshot().len(), 16);
    }

    #[tokio::test]
    async fn test_reload_drops_session_rules() {
        let backing = Arc::new(MemoryRuleStore::default());
        let store = PermissionStore::open(backing).await.unwrap();
        store
            .apply(&[update("Bash(ls)", RuleSource::Session)])
            .await
            .unwrap();
        assert_eq!(store.snapshot().len(), 1);

        let reloaded = store.reload().await.unwrap();
        assert!(reloaded.is_empty());
    }
}
