use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-plass.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub tools: ToolEntries,
    #[serde(default)]
    pub command_retries: Option<u32>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(default)]
    pub http_retries: Option<usize>,
}

/// Optional overrides for the external programs the runner shells out to.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ToolEntries {
    #[serde(default)]
    pub aws: Option<String>,
    #[serde(default)]
    pub wget: Option<String>,
    #[serde(default)]
    pub prefetch: Option<String>,
    #[serde(default)]
    pub fastq_dump: Option<String>,
    #[serde(default)]
    pub fastq_pair: Option<String>,
    #[serde(default)]
    pub vdb_config: Option<String>,
    #[serde(default)]
    pub plass: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub aws: String,
    pub wget: String,
    pub prefetch: String,
    pub fastq_dump: String,
    pub fastq_pair: String,
    pub vdb_config: String,
    pub plass: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            aws: "aws".to_string(),
            wget: "wget".to_string(),
            prefetch: "prefetch".to_string(),
            fastq_dump: "fastq-dump".to_string(),
            fastq_pair: "fastq_pair".to_string(),
            vdb_config: "vdb-config".to_string(),
            plass: "plass".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub tools: Tools,
    pub command_retries: u32,
    pub http_timeout: Duration,
    pub http_retries: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the explicit `path`, else the first existing default location,
    /// else built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => default_locations().into_iter().find(|path| path.exists()),
        };
        let Some(config_path) = config_path else {
            tracing::debug!("no config file found, using defaults");
            return Ok(ResolvedConfig::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;
        tracing::info!("Loaded config from {}", config_path.display());

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let defaults = Tools::default();
        let tools = config.tools;
        ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            tools: Tools {
                aws: tools.aws.unwrap_or(defaults.aws),
                wget: tools.wget.unwrap_or(defaults.wget),
                prefetch: tools.prefetch.unwrap_or(defaults.prefetch),
                fastq_dump: tools.fastq_dump.unwrap_or(defaults.fastq_dump),
                fastq_pair: tools.fastq_pair.unwrap_or(defaults.fastq_pair),
                vdb_config: tools.vdb_config.unwrap_or(defaults.vdb_config),
                plass: tools.plass.unwrap_or(defaults.plass),
            },
            command_retries: config.command_retries.unwrap_or(0),
            http_timeout: Duration::from_secs(config.http_timeout_secs.unwrap_or(300)),
            http_retries: config.http_retries.unwrap_or(3),
        }
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(dirs) = BaseDirs::new() {
        locations.push(dirs.config_dir().join("kira-plass").join("config.json"));
    }
    locations
}
