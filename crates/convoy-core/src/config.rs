use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;
pub const DEFAULT_RENEW_DEADLINE_SECS: u64 = 10;
pub const DEFAULT_RETRY_PERIOD_SECS: u64 = 2;
pub const DEFAULT_LEASE_NAME: &str = "convoy-schedule-worker";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_RECORD_PREFIX: &str = "schedule-";
pub const DEFAULT_LEGACY_RECORD_NAME: &str = "convoy-schedules";

/// Top-level config (convoy.toml + CONVOY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvoyConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub leader: LeaderConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Schedule worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// When false the daemon never starts the worker (CRUD-only replica).
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Seconds between due-schedule passes.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
        }
    }
}

/// Lease-based leader election settings.
///
/// With `enabled = false` the worker runs unconditionally, which is only
/// safe for single-replica deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_lease_name")]
    pub lease_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_lease_duration")]
    pub lease_duration_secs: u64,
    #[serde(default = "default_renew_deadline")]
    pub renew_deadline_secs: u64,
    #[serde(default = "default_retry_period")]
    pub retry_period_secs: u64,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lease_name: default_lease_name(),
            namespace: default_namespace(),
            lease_duration_secs: DEFAULT_LEASE_DURATION_SECS,
            renew_deadline_secs: DEFAULT_RENEW_DEADLINE_SECS,
            retry_period_secs: DEFAULT_RETRY_PERIOD_SECS,
        }
    }
}

/// Layout of schedule records inside the record backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend namespace the schedule records live in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Prefix prepended to the sanitized schedule ID to form the record key.
    #[serde(default = "default_record_prefix")]
    pub record_prefix: String,
    /// Name of the single record holding the pre-migration schedule array.
    #[serde(default = "default_legacy_record_name")]
    pub legacy_record_name: String,
    /// Run the legacy migration once at daemon startup.
    #[serde(default = "bool_true")]
    pub migrate_on_start: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            record_prefix: default_record_prefix(),
            legacy_record_name: default_legacy_record_name(),
            migrate_on_start: true,
        }
    }
}

/// Remote session runtime API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_url")]
    pub base_url: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            base_url: default_sessions_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}
fn default_lease_name() -> String {
    DEFAULT_LEASE_NAME.to_string()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_lease_duration() -> u64 {
    DEFAULT_LEASE_DURATION_SECS
}
fn default_renew_deadline() -> u64 {
    DEFAULT_RENEW_DEADLINE_SECS
}
fn default_retry_period() -> u64 {
    DEFAULT_RETRY_PERIOD_SECS
}
fn default_record_prefix() -> String {
    DEFAULT_RECORD_PREFIX.to_string()
}
fn default_legacy_record_name() -> String {
    DEFAULT_LEGACY_RECORD_NAME.to_string()
}
fn default_sessions_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_request_timeout() -> u64 {
    60
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.convoy/convoy.db", home)
}

impl ConvoyConfig {
    /// Load config from a TOML file with CONVOY_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `CONVOY_SCHEDULER__CHECK_INTERVAL_SECS=10`. A missing file is not an
    /// error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ConvoyConfig = Figment::from(Serialized::defaults(ConvoyConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CONVOY_").split("__"))
            .extract()
            .map_err(|e| crate::error::ConvoyError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would make leader election flap.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::ConvoyError;

        if self.scheduler.check_interval_secs == 0 {
            return Err(ConvoyError::Config(
                "scheduler.check_interval_secs must be greater than zero".to_string(),
            ));
        }
        let l = &self.leader;
        if l.lease_duration_secs <= l.renew_deadline_secs {
            return Err(ConvoyError::Config(format!(
                "leader.lease_duration_secs ({}) must exceed renew_deadline_secs ({})",
                l.lease_duration_secs, l.renew_deadline_secs
            )));
        }
        if l.renew_deadline_secs <= l.retry_period_secs {
            return Err(ConvoyError::Config(format!(
                "leader.renew_deadline_secs ({}) must exceed retry_period_secs ({})",
                l.renew_deadline_secs, l.retry_period_secs
            )));
        }
        if self.store.record_prefix.is_empty() {
            return Err(ConvoyError::Config("store.record_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.convoy/convoy.toml", home)
}
