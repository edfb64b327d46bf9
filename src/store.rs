use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use dirs_next::data_dir;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
struct StoredValue {
    saved_at: DateTime<Utc>,
    value: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    entries: BTreeMap<String, StoredValue>,
}

/// Key-value persistence backed by one JSON file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read store file {}", self.path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse store file {}", self.path.display()))
    }

    fn write(&self, file: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }
        let data = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write store file {}", self.path.display()))
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut file = self.read()?;
        file.entries.insert(
            key.to_string(),
            StoredValue {
                saved_at: Utc::now(),
                value: serde_json::to_value(value)?,
            },
        );
        self.write(&file)
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut file = self.read()?;
        let Some(stored) = file.entries.remove(key) else {
            return Ok(None);
        };
        let value = serde_json::from_value(stored.value)
            .with_context(|| format!("stored value for {key} has an unexpected shape"))?;
        Ok(Some(value))
    }

    pub fn saved_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read()?.entries.get(key).map(|stored| stored.saved_at))
    }
}

pub fn default_store_path() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(base.join("anisrc").join("shows.json"))
}
