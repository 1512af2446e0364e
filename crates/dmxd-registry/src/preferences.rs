use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};

/// Factory that hands out one preferences handle per namespace, mirroring
/// the original implementation's `PreferencesFactory`.
pub trait PreferencesFactory: Send + Sync {
    fn new_preferences(&self, namespace: &str) -> Box<dyn PreferencesHandle>;
}

/// Key-value persistence addressed by a namespace string (`"port"`, for
/// port patch/priority persistence — §6). One handle per namespace;
/// multiple values may be stored under the same key via `set_multi`.
pub trait PreferencesHandle: Send + Sync {
    fn load(&mut self) -> Result<()>;
    fn save(&self) -> Result<()>;
    fn set(&mut self, key: &str, value: String);
    fn set_multi(&mut self, key: &str, value: String);
    fn get(&self, key: &str) -> Option<String>;
    fn get_multi(&self, key: &str) -> Vec<String>;
    fn remove(&mut self, key: &str);
}

/// In-memory multimap-backed preferences, used by tests and as the base
/// the file-backed implementation wraps.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: HashMap<String, Vec<String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferencesHandle for MemoryPreferences {
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn save(&self) -> Result<()> {
        Ok(())
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), vec![value]);
    }

    fn set_multi(&mut self, key: &str, value: String) {
        self.values
            .entry(key.to_string())
            .or_default()
            .push(value);
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(|v| v.first()).cloned()
    }

    fn get_multi(&self, key: &str) -> Vec<String> {
        self.values.get(key).cloned().unwrap_or_default()
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// One JSON document per namespace on disk — the idiomatic-Rust analogue of
/// the original's one-file-per-namespace `FileBackedPreferences`.
pub struct FilePreferences {
    path: PathBuf,
    memory: MemoryPreferences,
}

impl FilePreferences {
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        let mut path = dir.as_ref().to_path_buf();
        path.push(format!("{namespace}.json"));
        Self {
            path,
            memory: MemoryPreferences::new(),
        }
    }
}

impl PreferencesHandle for FilePreferences {
    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        self.memory.values = serde_json::from_str(&contents)
            .map_err(|e| RegistryError::Preferences(e.to_string()))?;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.memory.values)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    fn set(&mut self, key: &str, value: String) {
        self.memory.set(key, value);
    }

    fn set_multi(&mut self, key: &str, value: String) {
        self.memory.set_multi(key, value);
    }

    fn get(&self, key: &str) -> Option<String> {
        self.memory.get(key)
    }

    fn get_multi(&self, key: &str) -> Vec<String> {
        self.memory.get_multi(key)
    }

    fn remove(&mut self, key: &str) {
        self.memory.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_preferences_round_trip() {
        let mut prefs = MemoryPreferences::new();
        prefs.set("1", "5".to_string());
        assert_eq!(prefs.get("1"), Some("5".to_string()));
        prefs.set_multi("tags", "a".to_string());
        prefs.set_multi("tags", "b".to_string());
        assert_eq!(prefs.get_multi("tags"), vec!["a", "b"]);
        prefs.remove("1");
        assert_eq!(prefs.get("1"), None);
    }

    #[test]
    fn file_preferences_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut prefs = FilePreferences::new(dir.path(), "port");
            prefs.set("usb-1", "3".to_string());
            prefs.save().unwrap();
        }
        let mut reloaded = FilePreferences::new(dir.path(), "port");
        reloaded.load().unwrap();
        assert_eq!(reloaded.get("usb-1"), Some("3".to_string()));
    }
}
