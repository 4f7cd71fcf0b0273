// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod core;
pub mod loader;
pub mod validation;

pub use self::core::{
    AppConfig, AwsConfig, DatabaseConfig, FindingMode, ObservabilityConfig, ScannerConfig,
    SearchConfig,
};

pub use self::loader::{load_config_with_overrides, ConfigFormat, ConfigLoader};

pub use self::validation::ConfigValidator;
