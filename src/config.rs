use kpotp::{SecretEncoding, StorageShape};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub version: u32,
    /// Shape `set` writes when the credential does not force one.
    pub preferred_shape: StorageShape,
    /// Encoding assumed for typed secrets when `--encoding` is not given.
    pub default_encoding: SecretEncoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            preferred_shape: StorageShape::BuiltIn,
            default_encoding: SecretEncoding::Base32,
        }
    }
}

impl Config {
    /// Load from `path`, or the default location. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_json::from_str(&data)?;
        Ok(cfg)
    }
}

pub fn config_path() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("cannot get config dir"))?;
    dir.push("kpotp");
    Ok(dir.join("config.json"))
}

pub fn save_config(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let s = serde_json::to_string_pretty(cfg)?;
    std::fs::write(path, s)?;
    Ok(())
}
