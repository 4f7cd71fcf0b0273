// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use validator::Validate;

use super::core::AppConfig;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_app_config(config: &AppConfig) -> Result<()> {
        config
            .validate()
            .context("Configuration validation failed")?;

        Self::validate_database_config(config)?;
        Self::validate_search_config(config)?;
        Self::validate_scanner_config(config)?;

        Ok(())
    }

    fn validate_database_config(config: &AppConfig) -> Result<()> {
        if !config.database.url.starts_with("postgresql://")
            && !config.database.url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "Database URL must start with postgresql:// or postgres://"
            ));
        }

        Ok(())
    }

    fn validate_search_config(config: &AppConfig) -> Result<()> {
        if !config.search.url.starts_with("http://") && !config.search.url.starts_with("https://") {
            return Err(anyhow::anyhow!("Search URL must start with http:// or https://"));
        }

        if config.search.username.is_some() != config.search.password.is_some() {
            return Err(anyhow::anyhow!(
                "Search username and password must be set together"
            ));
        }

        Ok(())
    }

    fn validate_scanner_config(config: &AppConfig) -> Result<()> {
        let scanner = &config.scanner;

        if scanner.max_run_duration_secs <= scanner.signal_timeout_secs {
            return Err(anyhow::anyhow!(
                "Max run duration must exceed the per-signal timeout"
            ));
        }

        if scanner.initial_backoff_ms > scanner.max_backoff_ms {
            return Err(anyhow::anyhow!(
                "Initial backoff cannot exceed max backoff"
            ));
        }

        Ok(())
    }
}
