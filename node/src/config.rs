//! Node configuration

use coursesync_sync::ConflictPolicy;
use coursesync_types::ContentKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Smallest and largest accepted pull page size.
pub const MIN_BATCH_SIZE: u32 = 1;
pub const MAX_BATCH_SIZE: u32 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Whether this node serves content or consumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Master,
    Client,
}

/// How often a client pulls from its master.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncInterval {
    #[default]
    Hourly,
    TwiceDaily,
    Daily,
}

impl SyncInterval {
    pub fn period(self) -> Duration {
        match self {
            Self::Hourly => Duration::from_secs(60 * 60),
            Self::TwiceDaily => Duration::from_secs(12 * 60 * 60),
            Self::Daily => Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub mode: Mode,

    /// Public base URL of this node, sent to the master on verify.
    #[serde(default)]
    pub site_url: String,

    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Secret inbound requests must present in `X-CourseSync-Key`.
    #[serde(default)]
    pub shared_secret: String,

    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Sync log entries older than this are purged.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub master_url: String,

    #[serde(default)]
    pub master_secret: String,

    /// Pull on a schedule while serving.
    #[serde(default)]
    pub auto_sync: bool,

    #[serde(default)]
    pub sync_interval: SyncInterval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_true")]
    pub courses: bool,
    #[serde(default = "default_true")]
    pub lessons: bool,
    #[serde(default = "default_true")]
    pub topics: bool,
    #[serde(default = "default_true")]
    pub quizzes: bool,
    #[serde(default = "default_true")]
    pub questions: bool,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Items requested per page when pulling.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_push_timeout")]
    pub push_timeout_secs: u64,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_verify_timeout")]
    pub verify_timeout_secs: u64,
}

// Defaults
fn default_site_name() -> String { "CourseSync".to_string() }
fn default_database() -> PathBuf { PathBuf::from("coursesync.db") }
fn default_log_retention_days() -> u32 { 30 }
fn default_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_true() -> bool { true }
fn default_batch_size() -> u32 { 10 }
fn default_push_timeout() -> u64 { 45 }
fn default_fetch_timeout() -> u64 { 30 }
fn default_verify_timeout() -> u64 { 15 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            courses: true,
            lessons: true,
            topics: true,
            quizzes: true,
            questions: true,
            conflict_policy: ConflictPolicy::default(),
            batch_size: default_batch_size(),
            push_timeout_secs: default_push_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            verify_timeout_secs: default_verify_timeout(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            site_url: String::new(),
            site_name: default_site_name(),
            shared_secret: String::new(),
            database: default_database(),
            log_retention_days: default_log_retention_days(),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl NodeConfig {
    /// Loads the config at `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.sync.batch_size) {
            return Err(ConfigError::Invalid(format!(
                "sync.batch_size must be between {MIN_BATCH_SIZE} and {MAX_BATCH_SIZE}, got {}",
                self.sync.batch_size
            )));
        }
        let sync = &self.sync;
        if [sync.push_timeout_secs, sync.fetch_timeout_secs, sync.verify_timeout_secs].contains(&0) {
            return Err(ConfigError::Invalid("timeouts must be at least one second".into()));
        }
        if self.mode == Mode::Client && self.client.auto_sync && self.client.master_url.is_empty() {
            return Err(ConfigError::Invalid(
                "client.auto_sync requires client.master_url".into(),
            ));
        }
        Ok(())
    }

    /// Kinds enabled for pulling, in dependency order.
    pub fn enabled_kinds(&self) -> Vec<ContentKind> {
        let s = &self.sync;
        ContentKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                ContentKind::Course => s.courses,
                ContentKind::Lesson => s.lessons,
                ContentKind::Topic => s.topics,
                ContentKind::Quiz => s.quizzes,
                ContentKind::Question => s.questions,
            })
            .collect()
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.push_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.fetch_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.verify_timeout_secs)
    }

    /// Name reported to peers; the site URL when no name is set.
    pub fn display_name(&self) -> &str {
        if self.site_name.trim().is_empty() { &self.site_url } else { &self.site_name }
    }
}
