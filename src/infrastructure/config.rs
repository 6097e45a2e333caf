//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional file, then `OPPORTUNITIES__*` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::domain::{PostingKind, SourceConfig, SourceLayout};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
    /// Listing pages scraped every cycle, in run order
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:/var/lib/harvester/opportunities.db`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Applied to every request, listing and detail pages alike
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    /// Total attempts per URL, including the first
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub follow_redirects: bool,
    /// Detail pages fetched at once for layouts that need them
    pub detail_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub task_name: String,
    pub initial_delay_seconds: u64,
    pub repeat_every_seconds: u64,
    /// Upper bound on a single sleep so registry changes are noticed
    pub poll_interval_seconds: u64,
    /// A run lock older than this is considered abandoned
    pub stale_lock_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `<data dir>/opportunity-harvester/logs`
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
    /// Per-module level overrides, e.g. `"sqlx" = "warn"`
    pub module_filters: HashMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: ConfigManager::default_database_url(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_retries: defaults::MAX_RETRIES,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            follow_redirects: true,
            detail_concurrency: defaults::DETAIL_CONCURRENCY,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            task_name: defaults::TASK_NAME.to_string(),
            initial_delay_seconds: defaults::INITIAL_DELAY_SECONDS,
            repeat_every_seconds: defaults::REPEAT_EVERY_SECONDS,
            poll_interval_seconds: defaults::POLL_INTERVAL_SECONDS,
            stale_lock_seconds: defaults::STALE_LOCK_SECONDS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_filters = HashMap::new();
        module_filters.insert("sqlx".to_string(), "warn".to_string());
        module_filters.insert("reqwest".to_string(), "warn".to_string());
        module_filters.insert("hyper".to_string(), "warn".to_string());
        module_filters.insert("html5ever".to_string(), "warn".to_string());

        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            file_prefix: "opportunity-harvester".to_string(),
            module_filters,
        }
    }
}

impl AppConfig {
    /// Configuration with the built-in source list
    pub fn with_default_sources() -> Self {
        Self {
            sources: sources::default_sources(),
            ..Self::default()
        }
    }

    pub fn enabled_sources(&self, kind: PostingKind) -> impl Iterator<Item = &SourceConfig> {
        self.sources
            .iter()
            .filter(move |source| source.enabled && source.kind == kind)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Validation { message });

        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be greater than 0".to_string());
        }
        if self.http.timeout_seconds == 0 {
            return invalid("http.timeout_seconds must be greater than 0".to_string());
        }
        if self.http.max_requests_per_second == 0 {
            return invalid("http.max_requests_per_second must be greater than 0".to_string());
        }
        if self.http.max_retries == 0 {
            return invalid("http.max_retries must be at least 1".to_string());
        }
        if self.http.detail_concurrency == 0 {
            return invalid("http.detail_concurrency must be greater than 0".to_string());
        }
        if self.scheduler.task_name.trim().is_empty() {
            return invalid("scheduler.task_name must not be empty".to_string());
        }
        if self.scheduler.repeat_every_seconds == 0 {
            return invalid("scheduler.repeat_every_seconds must be greater than 0".to_string());
        }
        if self.scheduler.poll_interval_seconds == 0 {
            return invalid("scheduler.poll_interval_seconds must be greater than 0".to_string());
        }
        let slowest_request = self
            .http
            .timeout_seconds
            .saturating_mul(u64::from(self.http.max_retries));
        let minimum_stale = self.scheduler.poll_interval_seconds.max(slowest_request);
        if self.scheduler.stale_lock_seconds <= minimum_stale {
            return invalid(format!(
                "scheduler.stale_lock_seconds must exceed {minimum_stale} (poll interval and slowest request)"
            ));
        }

        for source in &self.sources {
            if source.name.trim().is_empty() {
                return invalid(format!("source with url '{}' has no name", source.url));
            }
            match url::Url::parse(&source.url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => {
                    return invalid(format!(
                        "source '{}' uses unsupported scheme '{}'",
                        source.name,
                        parsed.scheme()
                    ));
                }
                Err(e) => {
                    return invalid(format!("source '{}' has invalid url: {e}", source.name));
                }
            }
        }

        Ok(())
    }
}

/// Loads `AppConfig` from defaults, an optional file and the environment
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Uses `OPPORTUNITIES_CONFIG` when set, else `config/opportunities.*`
    pub fn new() -> Self {
        let config_path = std::env::var_os(defaults::CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(defaults::CONFIG_FILE_STEM));
        Self { config_path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Application data directory, e.g. `~/.local/share/opportunity-harvester`
    pub fn get_app_data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join(defaults::APP_DIR_NAME))
    }

    pub fn default_database_url() -> String {
        let path = Self::get_app_data_dir()
            .map(|dir| dir.join(defaults::DATABASE_FILE))
            .unwrap_or_else(|| PathBuf::from(defaults::DATABASE_FILE));
        format!("sqlite:{}", path.display())
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let builtin = config::Config::try_from(&AppConfig::with_default_sources())?;
        let path = self.config_path.to_string_lossy();

        let settings = config::Config::builder()
            .add_source(builtin)
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;

        info!(
            "Loaded configuration ({} sources, database {})",
            config.sources.len(),
            config.database.url
        );
        Ok(config)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "opportunity-harvester";
    pub const DATABASE_FILE: &str = "opportunities.db";
    pub const CONFIG_FILE_STEM: &str = "config/opportunities";
    pub const CONFIG_PATH_ENV: &str = "OPPORTUNITIES_CONFIG";
    pub const ENV_PREFIX: &str = "OPPORTUNITIES";

    pub const DB_MAX_CONNECTIONS: u32 = 5;

    pub const USER_AGENT: &str =
        "Mozilla/5.0 (compatible; opportunity-harvester/0.3; +https://example.org/bot)";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 20;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    pub const DETAIL_CONCURRENCY: usize = 4;

    pub const TASK_NAME: &str = "scrape_all_opportunities";
    /// First run after registration
    pub const INITIAL_DELAY_SECONDS: u64 = 35;
    /// Daily
    pub const REPEAT_EVERY_SECONDS: u64 = 86_400;
    pub const POLL_INTERVAL_SECONDS: u64 = 60;
    pub const STALE_LOCK_SECONDS: u64 = 6 * 60 * 60;
}

/// Upstream listing pages scraped out of the box
pub mod sources {
    use super::{PostingKind, SourceConfig, SourceLayout};

    pub const DIXCOVERHUB_JOBS: &str = "https://dixcoverhub.jobuj.com/category/jobs/";
    pub const JOBSREGION_JOBS: &str = "https://www.jobsregion.com/category/job/";
    pub const DEROUNDTABLE_JOBS: &str = "https://deroundtable.com/category/jobs-vacancies/";
    pub const DIXCOVERHUB_SCHOLARSHIPS: &str = "https://dixcoverhub.jobuj.com/category/scholarships/";
    pub const SCHOLARSHIPREGION_SCHOLARSHIPS: &str =
        "https://www.scholarshipregion.com/category/scholarships/";

    pub fn default_sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig::new("Dixcoverhub", PostingKind::Job, SourceLayout::ElementorPosts, DIXCOVERHUB_JOBS),
            SourceConfig::new("JobsRegion", PostingKind::Job, SourceLayout::JobsRegion, JOBSREGION_JOBS),
            SourceConfig::new("DeRoundTable", PostingKind::Job, SourceLayout::DeRoundTable, DEROUNDTABLE_JOBS),
            SourceConfig::new(
                "Dixcoverhub",
                PostingKind::Scholarship,
                SourceLayout::ElementorPosts,
                DIXCOVERHUB_SCHOLARSHIPS,
            ),
            SourceConfig::new(
                "ScholarshipRegion",
                PostingKind::Scholarship,
                SourceLayout::ScholarshipRegion,
                SCHOLARSHIPREGION_SCHOLARSHIPS,
            ),
        ]
    }
}
