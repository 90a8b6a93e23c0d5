use anyhow::{Context, Result};
use kore_bridge::BridgeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const KORE_DIR: &str = ".kore";
const KORE_HOME_ENV: &str = "KORE_HOME";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub model: String,
    /// When set, hard queries are routed to this model by selector complexity.
    pub complex_model: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: kore_bridge::providers::ollama::DEFAULT_MODEL.to_string(),
            complex_model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Mind database; defaults to `mind.db` in the kore directory.
    pub database: Option<PathBuf>,
    /// Tool catalog (`.toml`, `.yaml` or `.yml`) used for complexity routing.
    pub catalog: Option<PathBuf>,
    /// Forget threshold applied by `kore forget` when none is given.
    pub forget_threshold: f64,
    pub provider: ProviderConfig,
    pub bridge: BridgeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            catalog: None,
            forget_threshold: 0.05,
            provider: ProviderConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| get_kore_dir().join("mind.db"))
    }
}

/// `$KORE_HOME`, or `~/.kore`.
pub fn get_kore_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(KORE_HOME_ENV)
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(KORE_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_kore_dir().join("config.toml")
}

pub fn ensure_kore_dir() -> Result<PathBuf> {
    let kore_dir = get_kore_dir();

    if !kore_dir.exists() {
        std::fs::create_dir_all(&kore_dir).with_context(|| {
            format!("Failed to create kore directory at {}", kore_dir.display())
        })?;
    }

    Ok(kore_dir)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!("Config file not found. Run 'kore init' to set up your configuration.")
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_kore_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let mut config = Config::default();
        config.provider.complex_model = Some("llama3.1:70b".into());
        config.bridge.rate_limit_per_minute = Some(30);
        config.catalog = Some(tmp.path().join("tools.toml"));

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[provider]\nmodel = \"qwen2.5\"\n\n[bridge]\ncache_enabled = false\n")
            .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.provider.model, "qwen2.5");
        assert!(!config.bridge.cache_enabled);
        assert_eq!(config.bridge.recall_limit, BridgeConfig::default().recall_limit);
        assert_eq!(config.forget_threshold, 0.05);
    }

    #[test]
    fn missing_file_points_to_init() {
        let tmp = TempDir::new().unwrap();
        let err = load_config_from(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("kore init"));
    }

    #[test]
    fn explicit_database_wins() {
        let config = Config {
            database: Some(PathBuf::from("/tmp/custom.db")),
            ..Config::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/custom.db"));
    }
}
