//! Configuration infrastructure
//!
//! Settings are layered: built-in defaults, then an optional TOML/JSON file,
//! then `FEEDBACK__*` environment variables (double underscore separates
//! nesting, e.g. `FEEDBACK__COLLECTION__MAX_PAGES=5`).
//!
//! Provider credentials are opaque key/value maps. A value of the form
//! `env:NAME` is looked up in the environment when the pipeline validates
//! its configuration, so secrets do not have to live in the file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{ConfigurationError, Region, SourceKind};
use crate::infrastructure::http_client::HttpClientConfig;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub collection: CollectionConfig,
    pub http: HttpClientConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub sources: Vec<SourceConfig>,
}

/// Pagination and pacing shared by every source unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Default region list (country/locale codes)
    pub regions: Vec<String>,

    /// Maximum pages requested per region
    pub max_pages: u32,

    /// A non-empty page smaller than this ends a region. 0 disables the check.
    pub min_page_size: usize,

    /// Records requested per page (providers with a fixed size ignore it)
    pub page_size: u32,

    /// Delay between pages of one region in milliseconds
    pub inter_page_delay_ms: u64,

    /// Delay between regions in milliseconds
    pub inter_region_delay_ms: u64,

    /// Optional cap on pages requested per source across all its regions
    pub global_page_ceiling: Option<u32>,

    /// Regions fetched at once. 1 keeps the strictly sequential schedule.
    pub max_concurrent_regions: usize,

    /// Entries kept per secondary breakdown in the summary
    pub summary_top_n: usize,
}

/// One provider to collect from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// App id, package name, helpdesk subdomain or business domain
    #[serde(default)]
    pub provider_id: String,

    /// Overrides `collection.regions`
    #[serde(default)]
    pub regions: Option<Vec<String>>,

    #[serde(default)]
    pub max_pages: Option<u32>,

    #[serde(default)]
    pub page_size: Option<u32>,

    #[serde(default)]
    pub min_page_size: Option<usize>,

    #[serde(default)]
    pub credentials: Credentials,
}

const fn default_enabled() -> bool {
    true
}

/// Opaque provider secrets. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

impl Credentials {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Replace `env:NAME` references using `lookup` and check required keys.
    pub fn resolve_with<F>(&self, kind: SourceKind, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut resolved = BTreeMap::new();
        for (key, value) in &self.0 {
            let value = match value.strip_prefix("env:") {
                Some(variable) => lookup(variable).ok_or_else(|| {
                    ConfigurationError::UnresolvedCredential {
                        kind,
                        key: key.clone(),
                        variable: variable.to_string(),
                    }
                })?,
                None => value.clone(),
            };
            resolved.insert(key.clone(), value);
        }

        for required in required_credentials(kind) {
            let present = resolved
                .get(*required)
                .is_some_and(|value| !value.trim().is_empty());
            if !present {
                return Err(ConfigurationError::MissingCredential {
                    kind,
                    key: (*required).to_string(),
                });
            }
        }
        Ok(Self(resolved))
    }
}

/// Credential keys each provider needs before any request is made.
pub const fn required_credentials(kind: SourceKind) -> &'static [&'static str] {
    match kind {
        SourceKind::GooglePlay => &["access_token"],
        SourceKind::Zendesk => &["email", "api_token"],
        SourceKind::AppStore | SourceKind::Trustpilot => &[],
    }
}

/// Where and how results are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,

    /// Base name of the output files
    pub file_stem: String,

    /// Append a UTC timestamp to the file stem
    pub timestamped: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Log directory. Defaults to `logs/` next to the executable.
    pub directory: Option<PathBuf>,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Module-specific log level filters (e.g., "reqwest": "info")
    pub module_filters: BTreeMap<String, String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            regions: defaults::REGIONS.iter().map(|r| (*r).to_string()).collect(),
            max_pages: defaults::MAX_PAGES,
            min_page_size: defaults::MIN_PAGE_SIZE,
            page_size: defaults::PAGE_SIZE,
            inter_page_delay_ms: defaults::INTER_PAGE_DELAY_MS,
            inter_region_delay_ms: defaults::INTER_REGION_DELAY_MS,
            global_page_ceiling: None,
            max_concurrent_regions: defaults::MAX_CONCURRENT_REGIONS,
            summary_top_n: defaults::SUMMARY_TOP_N,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        let directory = dirs::data_local_dir()
            .map(|dir| dir.join(defaults::APP_DIR_NAME).join("exports"))
            .unwrap_or_else(|| PathBuf::from("exports"));
        Self {
            directory,
            file_stem: defaults::OUTPUT_FILE_STEM.to_string(),
            timestamped: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let module_filters = [
            ("reqwest", "info"),
            ("hyper", "warn"),
            ("h2", "warn"),
            ("html5ever", "warn"),
            ("selectors", "warn"),
        ]
        .into_iter()
        .map(|(module, level)| (module.to_string(), level.to_string()))
        .collect();

        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            directory: None,
            max_files: defaults::LOG_MAX_FILES,
            module_filters,
        }
    }
}

impl SourceConfig {
    pub fn new(kind: SourceKind, provider_id: impl Into<String>) -> Self {
        Self {
            kind,
            enabled: true,
            provider_id: provider_id.into(),
            regions: None,
            max_pages: None,
            page_size: None,
            min_page_size: None,
            credentials: Credentials::default(),
        }
    }

    /// Effective region list, de-duplicated in configured order.
    pub fn effective_regions(&self, collection: &CollectionConfig) -> Vec<Region> {
        let codes = self.regions.as_ref().unwrap_or(&collection.regions);
        let mut regions: Vec<Region> = Vec::with_capacity(codes.len());
        for code in codes {
            let region = Region::new(code);
            if region.as_str().is_empty() || regions.contains(&region) {
                continue;
            }
            regions.push(region);
        }
        regions
    }

    pub fn effective_max_pages(&self, collection: &CollectionConfig) -> u32 {
        self.max_pages.unwrap_or(collection.max_pages)
    }

    pub fn effective_page_size(&self, collection: &CollectionConfig) -> u32 {
        self.page_size.unwrap_or(collection.page_size)
    }

    pub fn effective_min_page_size(&self, collection: &CollectionConfig) -> usize {
        self.min_page_size.unwrap_or(collection.min_page_size)
    }
}

impl AppConfig {
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Structural checks. Credential resolution happens separately.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let collection = &self.collection;
        if collection.max_concurrent_regions == 0 {
            return Err(ConfigurationError::invalid(
                "collection.max_concurrent_regions",
                "must be at least 1",
            ));
        }
        if collection.global_page_ceiling == Some(0) {
            return Err(ConfigurationError::invalid(
                "collection.global_page_ceiling",
                "must be at least 1 when set",
            ));
        }
        if self.http.timeout_seconds == 0 {
            return Err(ConfigurationError::invalid("http.timeout_seconds", "must be at least 1"));
        }
        if self.http.max_requests_per_second == 0 {
            return Err(ConfigurationError::invalid(
                "http.max_requests_per_second",
                "must be at least 1",
            ));
        }

        let mut any_enabled = false;
        for source in self.enabled_sources() {
            any_enabled = true;
            if source.provider_id.trim().is_empty() {
                return Err(ConfigurationError::MissingProviderId(source.kind));
            }
            if source.effective_regions(collection).is_empty() {
                return Err(ConfigurationError::invalid(
                    &format!("sources.{}.regions", source.kind),
                    "no regions configured",
                ));
            }
            if source.effective_max_pages(collection) == 0 {
                return Err(ConfigurationError::invalid(
                    &format!("sources.{}.max_pages", source.kind),
                    "must be at least 1",
                ));
            }
            if source.effective_page_size(collection) == 0 {
                return Err(ConfigurationError::invalid(
                    &format!("sources.{}.page_size", source.kind),
                    "must be at least 1",
                ));
            }
        }
        if !any_enabled {
            return Err(ConfigurationError::NoSources);
        }
        Ok(())
    }
}

/// Configuration manager for loading layered settings
pub struct ConfigManager {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigManager {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            env_prefix: defaults::ENV_PREFIX.to_string(),
        }
    }

    /// Default config file location (`<config dir>/feedback-collector/collector.toml`)
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(defaults::APP_DIR_NAME).join("collector.toml"))
    }

    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Load configuration. A missing explicit file is an error; a missing
    /// default file just means built-in defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigurationError> {
        let mut builder = config::Config::builder();

        match &self.config_path {
            Some(path) => {
                info!("Loading configuration from: {:?}", path);
                builder = builder.add_source(config::File::from(path.as_path()).required(true));
            }
            None => {
                if let Some(path) = Self::default_config_path() {
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("collection.regions"),
        );

        let settings = builder
            .build()
            .map_err(|e| ConfigurationError::Load(e.to_string()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::Load(e.to_string()))?;

        if config.sources.is_empty() {
            warn!("No sources configured");
        }
        Ok(config)
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "feedback-collector";

    pub const ENV_PREFIX: &str = "FEEDBACK";

    pub const REGIONS: &[&str] = &["us"];

    pub const MAX_PAGES: u32 = 10;

    pub const MIN_PAGE_SIZE: usize = 1;

    pub const PAGE_SIZE: u32 = 50;

    pub const INTER_PAGE_DELAY_MS: u64 = 2000;

    pub const INTER_REGION_DELAY_MS: u64 = 1000;

    pub const MAX_CONCURRENT_REGIONS: usize = 1;

    pub const SUMMARY_TOP_N: usize = 5;

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    pub const OUTPUT_FILE_STEM: &str = "feedback";

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_MAX_FILES: u32 = 5;
}
