use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use guardrail_core::{AppError, AppResult};
use guardrail_domain::DlqRetryPolicy;
use guardrail_infrastructure::SigningSettings;
use tracing::warn;

/// Backing store for DLQ, retention, and receipt state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStore {
    /// Shared Redis instance.
    Redis {
        /// Connection URL.
        url: String,
    },
    /// Process-local state, lost on restart.
    Memory,
}

/// Worker settings read from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub store: LifecycleStore,
    pub key_prefix: String,
    pub retry_policy: DlqRetryPolicy,
    pub signing: SigningSettings,
    pub max_ids_per_run: usize,
    pub audit_database_url: Option<String>,
    pub sweep_interval: Duration,
    pub sweep_per_resource_limit: usize,
    pub sweep_dry_run: bool,
    pub redelivery_enabled: bool,
    pub redelivery_batch: usize,
    pub delivery_timeout: Duration,
    pub worker_id: String,
    pub host: String,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        let store = match optional_env("LIFECYCLE_STORE")
            .unwrap_or_else(|| "redis".to_owned())
            .to_ascii_lowercase()
            .as_str()
        {
            "redis" => LifecycleStore::Redis {
                url: required_env("REDIS_URL")?,
            },
            "memory" => LifecycleStore::Memory,
            other => {
                return Err(AppError::Configuration(format!(
                    "LIFECYCLE_STORE must be 'redis' or 'memory', got '{other}'"
                )));
            }
        };
        let key_prefix =
            optional_env("LIFECYCLE_KEY_PREFIX").unwrap_or_else(|| "guardrail".to_owned());

        let defaults = DlqRetryPolicy::default();
        let retry_policy = DlqRetryPolicy {
            max_tries: lenient_env("DLQ_MAX_TRIES", defaults.max_tries),
            base_delay_sec: lenient_env("DLQ_BASE_DELAY_SEC", defaults.base_delay_sec),
            backoff_mult: lenient_env("DLQ_BACKOFF_MULT", defaults.backoff_mult),
            max_delay_sec: lenient_env("DLQ_MAX_DELAY_SEC", defaults.max_delay_sec),
            jitter_frac: lenient_env("DLQ_JITTER_FRAC", defaults.jitter_frac),
        }
        .sanitized();

        let signing = SigningSettings {
            ed25519_private_key: optional_env("PURGE_ED25519_PRIV"),
            hmac_secret: optional_env("PURGE_SIGNING_SECRET"),
            key_id: optional_env("PURGE_KEY_ID").unwrap_or_else(|| "default".to_owned()),
        };

        let max_ids_per_run = parse_env("RETENTION_MAX_IDS_PER_RUN", 1000_usize)?;
        require_positive("RETENTION_MAX_IDS_PER_RUN", max_ids_per_run)?;

        let audit_database_url = if parse_env("RETENTION_SQL_PURGE_ENABLED", false)? {
            Some(required_env("DATABASE_URL")?)
        } else {
            None
        };

        let sweep_interval_secs = parse_env("PURGE_SWEEP_INTERVAL_SECS", 300_u64)?;
        require_positive("PURGE_SWEEP_INTERVAL_SECS", sweep_interval_secs)?;
        let sweep_per_resource_limit = parse_env("PURGE_SWEEP_PER_RESOURCE_LIMIT", 500_usize)?;
        require_positive("PURGE_SWEEP_PER_RESOURCE_LIMIT", sweep_per_resource_limit)?;
        let sweep_dry_run = parse_env("PURGE_SWEEP_DRY_RUN", false)?;

        let redelivery_enabled = parse_env("DLQ_REDELIVERY_ENABLED", false)?;
        let redelivery_batch = parse_env("DLQ_REDELIVERY_BATCH", 50_usize)?;
        require_positive("DLQ_REDELIVERY_BATCH", redelivery_batch)?;
        let delivery_timeout_ms = parse_env("DLQ_DELIVERY_TIMEOUT_MS", 10_000_u64)?;
        require_positive("DLQ_DELIVERY_TIMEOUT_MS", delivery_timeout_ms)?;

        let worker_id = optional_env("WORKER_ID")
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let host = optional_env("HOSTNAME").unwrap_or_else(|| "unknown".to_owned());

        Ok(Self {
            store,
            key_prefix,
            retry_policy,
            signing,
            max_ids_per_run,
            audit_database_url,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            sweep_per_resource_limit,
            sweep_dry_run,
            redelivery_enabled,
            redelivery_batch,
            delivery_timeout: Duration::from_millis(delivery_timeout_ms),
            worker_id,
            host,
        })
    }
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required_env(name: &str) -> AppResult<String> {
    optional_env(name).ok_or_else(|| AppError::Configuration(format!("{name} is required")))
}

fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(name, optional_env(name).as_deref(), default)
}

fn lenient_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + Display,
    T::Err: Display,
{
    lenient_value(name, optional_env(name).as_deref(), default)
}

fn parse_value<T>(name: &str, raw: Option<&str>, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Configuration(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

/// Like [`parse_value`] but falls back to the default on garbage.
fn lenient_value<T>(name: &str, raw: Option<&str>, default: T) -> T
where
    T: FromStr + Copy + Display,
    T::Err: Display,
{
    match parse_value(name, raw, default) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, %default, "falling back to default");
            default
        }
    }
}

fn require_positive<T>(name: &str, value: T) -> AppResult<()>
where
    T: PartialOrd + Default,
{
    if value > T::default() {
        return Ok(());
    }

    Err(AppError::Configuration(format!(
        "{name} must be greater than zero"
    )))
}
