use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::AggregateFunction;
use crate::error::KiraError;
use crate::geo::{DEFAULT_RETRIES, DEFAULT_TIMEOUT_SECS};
use crate::store::default_cache_root;

pub const DEFAULT_CONFIG_FILE: &str = "kira-geo.json";
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 604_800;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub retries: Option<usize>,
    #[serde(default)]
    pub max_age_seconds: Option<u64>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub aggregate: Option<AggregateFunction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub cache_dir: Utf8PathBuf,
    pub retries: usize,
    pub max_age_seconds: u64,
    pub timeout_seconds: u64,
    pub aggregate: AggregateFunction,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(KiraError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }
        let cache_dir = match config.cache_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_cache_root()?,
        };
        Ok(ResolvedConfig {
            schema_version,
            cache_dir,
            retries: config.retries.unwrap_or(DEFAULT_RETRIES),
            max_age_seconds: config.max_age_seconds.unwrap_or(DEFAULT_MAX_AGE_SECONDS),
            timeout_seconds: config.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
            aggregate: config.aggregate.unwrap_or(AggregateFunction::Median),
        })
    }
}
