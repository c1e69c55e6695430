#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for plugci
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/plugci/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

use plugci_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// Static analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_enabled")]
    pub enabled: bool,
    /// Major API versions that have an analysis image
    #[serde(default = "default_supported_apis")]
    pub supported_apis: Vec<String>,
    /// Image name; `{api}` is replaced with the major version
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_cpus")]
    pub cpus: String,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Run one job per major version concurrently instead of in sequence
    #[serde(default)]
    pub concurrent_jobs: bool,
    /// Keep sandboxes and scratch files for inspection
    #[serde(default)]
    pub debug: bool,
}

/// Fixed locations inside the sandbox and the runtime binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_package_path")]
    pub package_path: String,
    #[serde(default = "default_dependencies_dir")]
    pub dependencies_dir: String,
    #[serde(default = "default_results_path")]
    pub results_path: String,
    /// Prefix stripped from file paths reported by the analyser
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,
}

/// Release/build store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite URL; plugin dependency lookups are off when unset
    pub database_url: Option<String>,
    pub resource_dir: Option<PathBuf>,
    /// Lowest release state considered publicly visible
    #[serde(default = "default_min_public_release_state")]
    pub min_public_release_state: i64,
    /// Build class of development builds
    #[serde(default = "default_dev_build_class")]
    pub dev_build_class: i64,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub tmp_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: default_analysis_enabled(),
            supported_apis: default_supported_apis(),
            image: default_image(),
            cpus: default_cpus(),
            memory: default_memory(),
            run_timeout_secs: default_run_timeout_secs(),
            concurrent_jobs: false,
            debug: false,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            package_path: default_package_path(),
            dependencies_dir: default_dependencies_dir(),
            results_path: default_results_path(),
            source_prefix: default_source_prefix(),
            docker_binary: default_docker_binary(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            resource_dir: None,
            min_public_release_state: default_min_public_release_state(),
            dev_build_class: default_dev_build_class(),
        }
    }
}

// Default value functions for serde
fn default_analysis_enabled() -> bool {
    true
}

fn default_supported_apis() -> Vec<String> {
    vec!["4".to_string(), "5".to_string()]
}

fn default_image() -> String {
    "pmmp/poggit-phpstan:0.5.2-pm{api}".to_string()
}

fn default_cpus() -> String {
    "1".to_string()
}

fn default_memory() -> String {
    "256M".to_string()
}

fn default_run_timeout_secs() -> u64 {
    900 // 15 minutes
}

fn default_package_path() -> String {
    "/source/plugin.zip".to_string()
}

fn default_dependencies_dir() -> String {
    "/deps".to_string()
}

fn default_results_path() -> String {
    "/source/phpstan-results.json".to_string()
}

fn default_source_prefix() -> String {
    "/source/".to_string()
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_min_public_release_state() -> i64 {
    4 // voted
}

fn default_dev_build_class() -> i64 {
    1
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("plugci").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;
        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: &Option<PathBuf>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Reject values no build could run with
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.analysis.run_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "analysis.run_timeout_secs must be greater than zero".to_string(),
            }
            .into());
        }
        if !self.analysis.image.contains("{api}") {
            return Err(ConfigError::Invalid {
                message: "analysis.image must contain the {api} placeholder".to_string(),
            }
            .into());
        }
        if self.analysis.supported_apis.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid {
                message: "analysis.supported_apis must not contain empty versions".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // PLUGCI_DEBUG
        if let Ok(debug) = std::env::var("PLUGCI_DEBUG") {
            self.analysis.debug = parse_bool("PLUGCI_DEBUG", debug)?;
        }

        // PLUGCI_ANALYSIS
        if let Ok(enabled) = std::env::var("PLUGCI_ANALYSIS") {
            self.analysis.enabled = parse_bool("PLUGCI_ANALYSIS", enabled)?;
        }

        // PLUGCI_RUN_TIMEOUT
        if let Ok(timeout) = std::env::var("PLUGCI_RUN_TIMEOUT") {
            self.analysis.run_timeout_secs = match timeout.parse() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: "PLUGCI_RUN_TIMEOUT".to_string(),
                        value: timeout,
                    }
                    .into())
                }
                Ok(seconds) => seconds,
            };
        }

        // PLUGCI_DOCKER
        if let Ok(docker) = std::env::var("PLUGCI_DOCKER") {
            if docker.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "PLUGCI_DOCKER".to_string(),
                    value: docker,
                }
                .into());
            }
            self.sandbox.docker_binary = docker;
        }

        // PLUGCI_DATABASE_URL
        if let Ok(url) = std::env::var("PLUGCI_DATABASE_URL") {
            self.store.database_url = Some(url);
        }

        // PLUGCI_RESOURCE_DIR
        if let Ok(dir) = std::env::var("PLUGCI_RESOURCE_DIR") {
            self.store.resource_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Get the scratch directory (with default)
    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.paths.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Get the resource directory (with default)
    #[must_use]
    pub fn resource_dir(&self) -> PathBuf {
        self.store.resource_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map_or_else(|| PathBuf::from("resources"), |dir| dir.join("plugci").join("resources"))
        })
    }
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}
