use anyhow::{Context, Result};
use config::{Config, Environment, File};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::manifest::DEFAULT_TTL_MINUTES;
use crate::types::Translation;

pub const ENV_PREFIX: &str = "ANISRC";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub translation: Translation,
    pub allow_adult: bool,
    pub manifest_ttl_minutes: i64,
    pub request_timeout_secs: u64,
    pub store_path: Option<PathBuf>,
    pub log_filter: String,
    pub player: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            translation: Translation::Sub,
            allow_adult: false,
            manifest_ttl_minutes: DEFAULT_TTL_MINUTES,
            request_timeout_secs: 30,
            store_path: None,
            log_filter: String::from("warn"),
            player: String::from("mpv"),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file (if present), then `ANISRC_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };
        let mut builder = Config::builder();
        if let Some(file) = &file {
            builder = builder.add_source(File::from(file.as_path()).required(path.is_some()));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("invalid configuration")?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("anisrc").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "translation = \"dub\"\nallow_adult = true\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.translation, Translation::Dub);
        assert!(settings.allow_adult);
        assert_eq!(settings.manifest_ttl_minutes, 30);
        assert_eq!(settings.player, "mpv");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn rendered_settings_parse_back() {
        let settings = Settings {
            store_path: Some(PathBuf::from("/tmp/shows.json")),
            ..Settings::default()
        };
        let rendered = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, settings);
    }
}
