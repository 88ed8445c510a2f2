use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{OrganismCode, Resolution};
use crate::error::KeggError;
use crate::fetcher::DEFAULT_POOL_SIZE;

pub const CONFIG_FILE: &str = "kegg-pm.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub database: Option<Utf8PathBuf>,
    #[serde(default)]
    pub data_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub organism: Option<String>,
    #[serde(default)]
    pub thread_pool_size: Option<usize>,
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    /// `None` means `<data_dir>/kegg.db`.
    pub database: Option<Utf8PathBuf>,
    /// `None` means the per-user cache directory.
    pub data_dir: Option<Utf8PathBuf>,
    pub organism: OrganismCode,
    pub thread_pool_size: usize,
    pub resolution: Resolution,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            database: None,
            data_dir: None,
            organism: OrganismCode::default(),
            thread_pool_size: DEFAULT_POOL_SIZE,
            resolution: Resolution::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; the implicit `kegg-pm.json` is optional.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KeggError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KeggError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KeggError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KeggError> {
        let organism = match config.organism {
            Some(value) => value.parse()?,
            None => OrganismCode::default(),
        };
        let thread_pool_size = match config.thread_pool_size {
            Some(0) => {
                return Err(KeggError::ConfigParse(
                    "thread_pool_size must be at least 1".to_string(),
                ));
            }
            Some(size) => size,
            None => DEFAULT_POOL_SIZE,
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            database: config.database,
            data_dir: config.data_dir,
            organism,
            thread_pool_size,
            resolution: config.resolution.unwrap_or_default(),
        })
    }
}
