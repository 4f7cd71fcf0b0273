// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::core::AppConfig;
use super::validation::ConfigValidator;

pub struct ConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref().to_path_buf();
        let format = Self::detect_format(&path)?;

        Ok(Self {
            config_path: path,
            format,
        })
    }

    pub fn with_format<P: AsRef<Path>>(config_path: P, format: ConfigFormat) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            format,
        }
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file format"))?;

        match extension {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported config file format: {}", extension)),
        }
    }

    /// Parse the file only, without environment overrides or validation
    pub fn parse(&self) -> Result<AppConfig> {
        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;

        let config: AppConfig = match self.format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(&content).context("Failed to parse YAML config")?
            }
            ConfigFormat::Toml => toml::from_str(&content).context("Failed to parse TOML config")?,
            ConfigFormat::Json => {
                serde_json::from_str(&content).context("Failed to parse JSON config")?
            }
        };

        Ok(config)
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = self.parse()?;
        apply_env_overrides(&mut config)?;
        ConfigValidator::validate_app_config(&config)?;
        Ok(config)
    }
}

/// Load from a file when given, otherwise defaults; env overrides apply in both cases
pub fn load_config_with_overrides(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => ConfigLoader::new(path)?.load_config(),
        None => {
            let mut config = AppConfig::default();
            apply_env_overrides(&mut config)?;
            ConfigValidator::validate_app_config(&config)?;
            Ok(config)
        }
    }
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Ok(db_url) = std::env::var("DATABASE_URL") {
        config.database.url = db_url;
    }

    if let Ok(search_url) = std::env::var("OPENSEARCH_URL") {
        config.search.url = search_url;
    }

    if let Ok(mode) = std::env::var("FINDING_MODE") {
        config.database.finding_mode = mode.parse()?;
    }

    if let Ok(log_level) = std::env::var("LOG_LEVEL") {
        config.observability.log_level = log_level;
    }

    if let Ok(concurrency) = std::env::var("MAX_CONCURRENCY") {
        config.scanner.max_concurrency = concurrency
            .parse()
            .context("Invalid MAX_CONCURRENCY")?;
    }

    if let Ok(interval) = std::env::var("WORKER_SCAN_INTERVAL_SECS") {
        config.scanner.scan_interval_secs = interval
            .parse()
            .context("Invalid WORKER_SCAN_INTERVAL_SECS")?;
    }

    if let Ok(region) = std::env::var("AWS_REGION") {
        config.aws.region = region;
    }

    if let Ok(endpoint) = std::env::var("S3_ENDPOINT_URL") {
        config.aws.s3_endpoint_url = Some(endpoint);
    }

    Ok(())
}
