use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::matcher::{
    MatchTolerances, DEFAULT_DURATION_TOLERANCE_MS, DEFAULT_TIGHT_DURATION_TOLERANCE_MS,
};

pub const CONFIG_VERSION: u32 = 1;
pub const CONFIG_ENV: &str = "TUNEDEX_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub version: u32,
    pub index_path: String,
    pub music_roots: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub duration_tolerance_ms: u32,
    pub tight_duration_tolerance_ms: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            index_path: "catalog.redb".to_string(),
            music_roots: Vec::new(),
            audio_extensions: ["mp3", "flac", "m4a", "aac", "wav", "aiff", "aif", "ogg", "alac"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            duration_tolerance_ms: DEFAULT_DURATION_TOLERANCE_MS,
            tight_duration_tolerance_ms: DEFAULT_TIGHT_DURATION_TOLERANCE_MS,
        }
    }
}

impl CatalogConfig {
    pub fn tolerances(&self) -> MatchTolerances {
        MatchTolerances {
            duration_ms: self.duration_tolerance_ms,
            tight_duration_ms: self.tight_duration_tolerance_ms,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var(CONFIG_ENV) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Loads the config at `path`, writing defaults there first if it is missing.
/// The flag is true when the file was created.
pub fn load_or_create_config(path: &Path) -> Result<(CatalogConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: CatalogConfig = serde_yaml::from_str(&contents)?;
        let defaults = CatalogConfig::default();
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.index_path.trim().is_empty() {
            config.index_path = defaults.index_path;
        }
        if config.audio_extensions.is_empty() {
            config.audio_extensions = defaults.audio_extensions;
        }
        if config.duration_tolerance_ms == 0 {
            config.duration_tolerance_ms = defaults.duration_tolerance_ms;
        }
        if config.tight_duration_tolerance_ms == 0 {
            config.tight_duration_tolerance_ms = defaults.tight_duration_tolerance_ms;
        }
        if config.tight_duration_tolerance_ms > config.duration_tolerance_ms {
            config.tight_duration_tolerance_ms = config.duration_tolerance_ms;
        }
        return Ok((config, false));
    }

    let config = CatalogConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &CatalogConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use super::{load_or_create_config, resolve_path, CatalogConfig};

    #[test]
    fn creates_default_config_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.yaml");

        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert_eq!(config, CatalogConfig::default());

        let (_, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
    }

    #[test]
    fn fills_missing_and_zero_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            concat!(
                "music_roots: [\"/music\"]\n",
                "duration_tolerance_ms: 0\n",
                "tight_duration_tolerance_ms: 5000\n",
            ),
        )
        .unwrap();

        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
        assert_eq!(config.music_roots, vec!["/music"]);
        assert_eq!(config.index_path, "catalog.redb");
        assert_eq!(config.tolerances().duration_ms, 2_000);
        assert_eq!(config.tolerances().tight_duration_ms, 2_000);
    }

    #[test]
    fn resolves_relative_to_config() {
        let config_path = Path::new("/etc/tunedex/config.yaml");
        assert_eq!(
            resolve_path(config_path, "catalog.redb"),
            PathBuf::from("/etc/tunedex/catalog.redb")
        );
        assert_eq!(resolve_path(config_path, "/data/x.redb"), PathBuf::from("/data/x.redb"));
        assert_eq!(
            resolve_path(Path::new("config.yaml"), "catalog.redb"),
            PathBuf::from("./catalog.redb")
        );
    }
}
