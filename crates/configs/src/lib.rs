use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    /// Pretty-print the JSON text of each stored value.
    #[serde(default)]
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path(), pretty: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_warm_on_read")]
    pub warm_on_read: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { warm_on_read: default_warm_on_read() }
    }
}

fn default_store_path() -> String { "data/settings.json".to_string() }
fn default_warm_on_read() -> bool { true }

/// Load from `CONFIG_PATH` (default `config.toml`); a missing file yields defaults.
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if !std::path::Path::new(&path).exists() {
        return Ok(AppConfig::default());
    }
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.store.normalize_from_env();
        self.store.validate()?;
        Ok(())
    }
}

impl StoreConfig {
    pub fn normalize_from_env(&mut self) {
        // SETTINGS_STORE_PATH wins over the file
        if let Ok(path) = std::env::var("SETTINGS_STORE_PATH") {
            if !path.trim().is_empty() {
                self.path = path;
            }
        }
        self.path = self.path.trim().to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(anyhow!("store.path is empty; set it in config.toml or SETTINGS_STORE_PATH"));
        }
        if self.path.ends_with('/') || self.path.ends_with('\\') {
            return Err(anyhow!("store.path must name a file, got directory `{}`", self.path));
        }
        Ok(())
    }
}
