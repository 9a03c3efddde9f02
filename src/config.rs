//! Orchestrator configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). Unset keys take their default; keys holding an unparsable
//! value also take their default, with a warning. [`AppConfig::validate`]
//! then rejects combinations the process cannot run with.

use std::net::SocketAddr;
use std::time::Duration;

use crate::feed::{DEFAULT_STATION_INFO_URL, DEFAULT_STATION_STATUS_URL, FeedConfig};
use crate::inference::{DEFAULT_BASE_URL, PredictionConfig};

/// Configuration failure. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is not a socket address.
    #[error("invalid LISTEN_ADDR {value:?}: {source}")]
    ListenAddr {
        /// Raw value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// Persistence is enabled but no database URL was given.
    #[error("DATABASE_URL is required when PERSISTENCE_ENABLED is true")]
    MissingDatabaseUrl,

    /// An interval or timeout is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// A required URL is empty.
    #[error("{0} must not be empty")]
    EmptyUrl(&'static str),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// `json` (any case) selects [`LogFormat::Json`]; anything else is text.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Database section.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `false` selects the in-memory store.
    pub persistence_enabled: bool,
    /// PostgreSQL connection string.
    pub url: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Minimum idle connections.
    pub min_connections: u32,
    /// Timeout for acquiring a connection.
    pub connect_timeout: Duration,
}

/// Timing of the two background loops.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Collection period, also the alignment granularity.
    pub collection_interval: Duration,
    /// Wait for the next aligned boundary before the first collection.
    pub align_collection: bool,
    /// Run one collection in the background right after startup. Only
    /// applies when `align_collection` is set; an unaligned loop collects
    /// at once anyway.
    pub refresh_on_startup: bool,
    /// Prediction period after the initial phase.
    pub prediction_interval: Duration,
    /// Budget for the initial wait on the prediction service.
    pub prediction_max_wait: Duration,
    /// Pause between initial prediction attempts.
    pub prediction_check_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            collection_interval: Duration::from_secs(15 * 60),
            align_collection: true,
            refresh_on_startup: true,
            prediction_interval: Duration::from_secs(2 * 60 * 60),
            prediction_max_wait: Duration::from_secs(5 * 60),
            prediction_check_interval: Duration::from_secs(10),
        }
    }
}

/// Top-level configuration.
///
/// Loaded once at startup via [`AppConfig::from_env`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Database section.
    pub database: DatabaseConfig,
    /// Feed client section.
    pub feed: FeedConfig,
    /// Prediction client section.
    pub prediction: PredictionConfig,
    /// Background loop timing.
    pub schedule: ScheduleConfig,
    /// Bound on draining requests and joining the loops at shutdown.
    pub shutdown_timeout: Duration,
}

impl AppConfig {
    /// Loads configuration from the process environment, after optionally
    /// reading a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `LISTEN_ADDR` is malformed or
    /// [`AppConfig::validate`] fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let raw_addr = env.string("LISTEN_ADDR", "0.0.0.0:8080");
        let listen_addr = raw_addr
            .parse()
            .map_err(|source| ConfigError::ListenAddr {
                value: raw_addr.clone(),
                source,
            })?;

        let database = DatabaseConfig {
            persistence_enabled: env.bool("PERSISTENCE_ENABLED", true),
            url: env.string("DATABASE_URL", ""),
            max_connections: env.parse("DATABASE_MAX_CONNECTIONS", 25),
            min_connections: env.parse("DATABASE_MIN_CONNECTIONS", 5),
            connect_timeout: Duration::from_secs(env.parse("DATABASE_CONNECT_TIMEOUT_SECS", 5)),
        };

        let feed = FeedConfig::new(
            env.string("FEED_STATION_INFO_URL", DEFAULT_STATION_INFO_URL),
            env.string("FEED_STATION_STATUS_URL", DEFAULT_STATION_STATUS_URL),
        )
        .with_timeout(Duration::from_secs(env.parse("FEED_TIMEOUT_SECS", 30)));

        let prediction = PredictionConfig::new(env.string("PREDICTION_SERVICE_URL", DEFAULT_BASE_URL))
            .with_timeout(minutes(env.parse("PREDICTION_REQUEST_TIMEOUT_MIN", 5)));

        let schedule = ScheduleConfig {
            collection_interval: minutes(env.parse("DATA_COLLECTION_INTERVAL_MIN", 15)),
            align_collection: env.bool("DATA_COLLECTION_ALIGN", true),
            refresh_on_startup: env.bool("REFRESH_ON_STARTUP", true),
            prediction_interval: minutes(env.parse::<u64>("PREDICTION_INTERVAL_HOURS", 2).saturating_mul(60)),
            prediction_max_wait: minutes(env.parse("PREDICTION_SERVICE_MAX_WAIT_MIN", 5)),
            prediction_check_interval: Duration::from_secs(
                env.parse("PREDICTION_SERVICE_CHECK_INTERVAL_SEC", 10),
            ),
        };

        let config = Self {
            listen_addr,
            database,
            feed,
            prediction,
            schedule,
            shutdown_timeout: Duration::from_secs(env.parse("SERVER_SHUTDOWN_TIMEOUT_SEC", 10)),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the loaded values.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when persistence is enabled without a
    /// database URL, when any interval or timeout is zero, or when a feed
    /// or prediction URL is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.persistence_enabled && self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        let durations = [
            ("DATABASE_CONNECT_TIMEOUT_SECS", self.database.connect_timeout),
            ("FEED_TIMEOUT_SECS", self.feed.timeout),
            ("PREDICTION_REQUEST_TIMEOUT_MIN", self.prediction.timeout),
            ("DATA_COLLECTION_INTERVAL_MIN", self.schedule.collection_interval),
            ("PREDICTION_INTERVAL_HOURS", self.schedule.prediction_interval),
            ("PREDICTION_SERVICE_MAX_WAIT_MIN", self.schedule.prediction_max_wait),
            (
                "PREDICTION_SERVICE_CHECK_INTERVAL_SEC",
                self.schedule.prediction_check_interval,
            ),
            ("SERVER_SHUTDOWN_TIMEOUT_SEC", self.shutdown_timeout),
        ];
        if let Some((key, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Zero(*key));
        }

        let urls = [
            ("FEED_STATION_INFO_URL", &self.feed.station_info_url),
            ("FEED_STATION_STATUS_URL", &self.feed.station_status_url),
            ("PREDICTION_SERVICE_URL", &self.prediction.base_url),
        ];
        if let Some((key, _)) = urls.iter().find(|(_, url)| url.trim().is_empty()) {
            return Err(ConfigError::EmptyUrl(*key));
        }

        Ok(())
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    /// Parses `key` as `T`, returning `default` on missing or invalid values.
    fn parse<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + std::fmt::Display,
    {
        match (self.0)(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, %default, "invalid value, using default");
                default
            }),
        }
    }

    /// Accepts `"true"`, `"1"`, `"false"`, `"0"` (case-insensitive).
    fn bool(&self, key: &str, default: bool) -> bool {
        match (self.0)(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None => default,
            Some("true" | "1") => true,
            Some("false" | "0") => false,
            Some(other) => {
                tracing::warn!(key, value = other, default, "invalid boolean, using default");
                default
            }
        }
    }
}
