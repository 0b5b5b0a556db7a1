//! Configuration management for supplierfinder
//!
//! Configuration is loaded from `./config/supplierfinder.toml` unless another
//! path is given. The template embedded below is the only place defaults live.
//! API keys may be left empty in the file and supplied through environment
//! variables instead.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/supplierfinder.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/supplierfinder.toml");

pub const SEARCH_API_KEY_ENV: &str = "SUPPLIERFINDER_SEARCH_API_KEY";
pub const REGISTRY_API_KEY_ENV: &str = "SUPPLIERFINDER_REGISTRY_API_KEY";

const MAX_FETCH_CONCURRENCY: usize = 32;

/// Largest page body the fetcher may be configured to keep
pub const MAX_PAGE_BYTES_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be an ascending [min, max] pair")]
    InvalidRange { field: String },

    #[error("Configuration field '{field}' is {value}, expected {min}..={max}")]
    OutOfRange {
        field: String,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Page fetching configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub page_timeout_secs: u64,
    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: usize,
}

fn default_max_page_bytes() -> usize {
    5 * 1024 * 1024
}

impl HttpConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

/// Search backend and pagination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub timeout_secs: u64,
    /// Result pages requested per search
    pub max_pages: u32,
    /// Groups (one URL each) requested per result page
    pub groups_per_page: u32,
    /// Pagination stops as soon as this many candidates are admitted
    pub candidate_cap: usize,
    /// Page fetches in flight at once within a result page
    pub fetch_concurrency: usize,
    /// Token appended to the free-text query
    pub query_token: String,
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Company registry enrichment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_registry_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_registry_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub criteria: CriteriaConfig,
}

/// Thresholds a registry profile must meet. Unset criteria are not checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CriteriaConfig {
    pub company_status: Option<String>,
    pub company_size: Option<String>,
    pub risk_level: Option<String>,
    /// Failure risk index, inclusive bounds
    pub ifr_range: Option<[f64; 2]>,
    /// Due diligence index, inclusive bounds
    pub ido_range: Option<[f64; 2]>,
    /// Payment discipline index, inclusive bounds
    pub ipd_range: Option<[f64; 2]>,
    pub min_revenue: Option<f64>,
    pub sro_name: Option<String>,
    /// A license whose activity mentions this text is required
    pub licensed_activity: Option<String>,
}

impl CriteriaConfig {
    pub fn is_empty(&self) -> bool {
        self.company_status.is_none()
            && self.company_size.is_none()
            && self.risk_level.is_none()
            && self.ifr_range.is_none()
            && self.ido_range.is_none()
            && self.ipd_range.is_none()
            && self.min_revenue.is_none()
            && self.sro_name.is_none()
            && self.licensed_activity.is_none()
    }
}

fn default_registry_base_url() -> String {
    "https://bdwh.yandex-team.ru/api/v1/spark".to_string()
}

fn default_registry_timeout_secs() -> u64 {
    15
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_registry_base_url(),
            api_key: String::new(),
            timeout_secs: default_registry_timeout_secs(),
            criteria: CriteriaConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path, apply environment overrides
    /// and validate
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse the embedded template without touching the filesystem
    pub fn from_template() -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill API keys from the environment; non-empty variables win over the file
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(SEARCH_API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.search.api_key = key;
        }
        if let Some(key) = lookup(REGISTRY_API_KEY_ENV).filter(|k| !k.is_empty()) {
            self.registry.api_key = key;
        }
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.page_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.page_timeout_secs".to_string(),
            });
        }
        Self::validate_range(
            "http.max_page_bytes",
            self.http.max_page_bytes as u64,
            1,
            MAX_PAGE_BYTES_LIMIT as u64,
        )?;

        Self::validate_url("search.endpoint", &self.search.endpoint)?;
        if self.search.timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "search.timeout_secs".to_string(),
            });
        }
        if self.search.query_token.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "search.query_token".to_string(),
            });
        }
        Self::validate_range("search.max_pages", self.search.max_pages as u64, 1, 100)?;
        Self::validate_range("search.groups_per_page", self.search.groups_per_page as u64, 1, 100)?;
        Self::validate_range("search.candidate_cap", self.search.candidate_cap as u64, 1, 10_000)?;
        Self::validate_range(
            "search.fetch_concurrency",
            self.search.fetch_concurrency as u64,
            1,
            MAX_FETCH_CONCURRENCY as u64,
        )?;

        if self.registry.enabled {
            Self::validate_url("registry.base_url", &self.registry.base_url)?;
            if self.registry.timeout_secs == 0 {
                return Err(ConfigError::EmptyRequired {
                    field: "registry.timeout_secs".to_string(),
                });
            }
        }

        let criteria = &self.registry.criteria;
        for (field, range) in [
            ("registry.criteria.ifr_range", criteria.ifr_range),
            ("registry.criteria.ido_range", criteria.ido_range),
            ("registry.criteria.ipd_range", criteria.ipd_range),
        ] {
            if let Some([min, max]) = range {
                if min.is_nan() || max.is_nan() || min > max {
                    return Err(ConfigError::InvalidRange {
                        field: field.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidUrl {
            field: field.to_string(),
            url: value.to_string(),
        };
        let parsed = Url::parse(value).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid());
        }
        Ok(())
    }

    fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
        if value < min || value > max {
            return Err(ConfigError::OutOfRange {
                field: field.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Write the default configuration file to `path`, creating parent
    /// directories as needed
    pub fn create_default_config(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}
