use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What a trigger instance remembers between activations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticData {
    pub webhook_id: String,
}

/// Key-value storage for [`StaticData`], one entry per trigger instance.
pub trait WebhookStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StaticData>>;
    fn set(&self, key: &str, data: StaticData) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, StaticData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WebhookStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StaticData>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Webhook store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, data: StaticData) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Webhook store lock poisoned"))?
            .insert(key.to_string(), data);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Webhook store lock poisoned"))?
            .remove(key);
        Ok(())
    }
}

/// JSON file holding every instance's entry; rewritten on each change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, StaticData>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read webhook store: {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse webhook store: {}", self.path.display()))
    }

    fn write(&self, entries: &BTreeMap<String, StaticData>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory: {}", parent.display())
            })?;
        }
        let content = serde_json::to_string_pretty(entries).context("Failed to serialize webhook store")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write webhook store: {}", self.path.display()))
    }

    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, StaticData>)) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Webhook store lock poisoned"))?;
        let mut entries = self.read()?;
        change(&mut entries);
        self.write(&entries)
    }
}

impl WebhookStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<StaticData>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Webhook store lock poisoned"))?;
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, data: StaticData) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), data);
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn data(id: &str) -> StaticData {
        StaticData {
            webhook_id: id.to_string(),
        }
    }

    #[test]
    fn test_memory_store_scopes_by_key() {
        let store = MemoryStore::new();
        store.set("a", data("1")).unwrap();
        store.set("b", data("2")).unwrap();
        store.set("a", data("3")).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(data("3")));
        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap(), Some(data("2")));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("webhooks.json");

        FileStore::new(&path).set("trigger", data("42")).unwrap();
        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("trigger").unwrap(), Some(data("42")));

        reopened.delete("trigger").unwrap();
        assert_eq!(FileStore::new(&path).get("trigger").unwrap(), None);
    }

    #[test]
    fn test_file_store_uses_camel_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("webhooks.json");
        FileStore::new(&path).set("trigger", data("7")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["trigger"]["webhookId"], "7");
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.get("trigger").unwrap(), None);
    }
}
