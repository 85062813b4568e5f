use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::{self, RuleSet, RuleSpec};
use crate::cli::RunArgs;

pub const DEFAULT_SITEMAP_URL: &str = "https://www.officeeasy.fr/sitemap.xml";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("category '{category}' has an invalid pattern: {source}")]
    InvalidPattern {
        category: String,
        source: regex::Error,
    },

    #[error("category '{0}' is declared more than once")]
    DuplicateCategory(String),

    #[error("category names cannot be empty")]
    EmptyCategoryName,

    #[error("'{0}' is a report column and cannot name a category")]
    ReservedCategoryName(String),

    #[error("product category '{0}' is neither a rule nor the fallback")]
    UnknownProductCategory(String),

    #[error("invalid duration '{value}': {source}")]
    InvalidDuration {
        value: String,
        source: humantime::DurationError,
    },

    #[error("unsupported backend '{0}' (expected \"csv\" or \"sqlite\")")]
    UnsupportedBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Csv,
    Sqlite,
}

impl Backend {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Backend::Csv),
            "sqlite" if cfg!(feature = "sqlite") => Ok(Backend::Sqlite),
            _ => Err(ConfigError::UnsupportedBackend(value.to_string())),
        }
    }
}

/// File names inside the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileNames {
    pub snapshot: String,
    pub category_stats: String,
    pub change_summary: String,
    pub change_log: String,
    pub last_run: String,
    pub export_prefix: String,
    pub database: String,
}

impl Default for FileNames {
    fn default() -> Self {
        FileNames {
            snapshot: "old_sitemap_urls.txt".to_string(),
            category_stats: "sitemap_categories.csv".to_string(),
            change_summary: "pages_produits_in_out.csv".to_string(),
            change_log: "pages_produits_in_out_list.csv".to_string(),
            last_run: "pages_produits_last_analysis.csv".to_string(),
            export_prefix: "pages_produits".to_string(),
            database: "sitedrift.db".to_string(),
        }
    }
}

// on-disk shape, every key optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    sitemap_url: Option<String>,
    sitemap_file: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    timeout: Option<String>,
    backend: Option<String>,
    product_category: Option<String>,
    fallback_category: Option<String>,
    categories: Option<Vec<RuleSpec>>,
    files: FileNames,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sitemap_url: String,
    /// Read the sitemap from disk instead of `sitemap_url`.
    pub sitemap_file: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub timeout: Duration,
    pub backend: Backend,
    pub product_category: String,
    pub fallback_category: String,
    pub categories: Vec<RuleSpec>,
    pub files: FileNames,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sitemap_url: DEFAULT_SITEMAP_URL.to_string(),
            sitemap_file: None,
            data_dir: PathBuf::from("."),
            timeout: DEFAULT_TIMEOUT,
            backend: Backend::Csv,
            product_category: classify::DEFAULT_PRODUCT_CATEGORY.to_string(),
            fallback_category: classify::DEFAULT_FALLBACK.to_string(),
            categories: classify::default_rules(),
            files: FileNames::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the platform config dir when that file
    /// exists, or fall back to the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.is_file() => p,
                _ => return Ok(Config::default()),
            },
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content)?;
        let defaults = Config::default();

        let timeout = match file.timeout {
            Some(value) => parse_duration(&value)?,
            None => defaults.timeout,
        };
        let backend = match file.backend {
            Some(value) => Backend::parse(&value)?,
            None => defaults.backend,
        };

        let config = Config {
            sitemap_url: file.sitemap_url.unwrap_or(defaults.sitemap_url),
            sitemap_file: file.sitemap_file,
            data_dir: file.data_dir.unwrap_or(defaults.data_dir),
            timeout,
            backend,
            product_category: file.product_category.unwrap_or(defaults.product_category),
            fallback_category: file.fallback_category.unwrap_or(defaults.fallback_category),
            categories: file.categories.unwrap_or(defaults.categories),
            files: file.files,
        };

        // surface rule mistakes at load time rather than mid-run
        config.rule_set()?;
        Ok(config)
    }

    /// Command-line flags win over the config file.
    pub fn apply_run_args(&mut self, args: &RunArgs) -> Result<(), ConfigError> {
        if let Some(url) = &args.sitemap_url {
            self.sitemap_url = url.clone();
            self.sitemap_file = None;
        }
        if let Some(file) = &args.sitemap_file {
            self.sitemap_file = Some(file.clone());
        }
        if let Some(dir) = &args.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(timeout) = &args.timeout {
            self.timeout = parse_duration(timeout)?;
        }
        Ok(())
    }

    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let rules = RuleSet::new(&self.categories, &self.fallback_category)?;
        if !rules.knows(&self.product_category) {
            return Err(ConfigError::UnknownProductCategory(self.product_category.clone()));
        }
        Ok(rules)
    }

    pub fn data_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_path(&self.files.snapshot)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "sitedrift")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|source| ConfigError::InvalidDuration {
        value: value.to_string(),
        source,
    })
}
