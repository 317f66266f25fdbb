//! Configuration for the command-line front end.
//!
//! Loaded, later sources winning, from:
//! - `orm-artifacts.toml`, `.orm-artifacts.toml`, `config/orm-artifacts.toml`
//! - an explicit file passed with `--config`
//! - environment variables `ORM_ARTIFACTS__<SECTION>__<KEY>`
//!
//! ## Example config file (orm-artifacts.toml):
//! ```toml
//! [generate]
//! strict_defaults = false
//!
//! [output]
//! pretty = true
//! ```

use std::path::Path;

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::types::GenerateOptions;

const CONFIG_LOCATIONS: [&str; 3] = [
    "orm-artifacts.toml",
    ".orm-artifacts.toml",
    "config/orm-artifacts.toml",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default)]
    pub generate: GenerateConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Fail on default values that cannot be mapped instead of dropping them
    #[serde(default = "default_true")]
    pub strict_defaults: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            strict_defaults: true,
        }
    }
}

impl ArtifactsConfig {
    /// Load configuration from the default locations.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding `config_path` as a required source.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in CONFIG_LOCATIONS {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("ORM_ARTIFACTS")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions::new().strict_defaults(self.generate.strict_defaults)
    }
}
