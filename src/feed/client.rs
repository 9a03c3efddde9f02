//! HTTP client for the station-information and station-status feeds.
//!
//! Both feeds are requested concurrently under one deadline. The combined
//! fetch succeeds only if both legs return HTTP 200 with a well-formed
//! envelope; the first failing leg cancels the other.

use std::fmt;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;

use super::error::FeedError;
use super::types::{FeedEnvelope, FeedSnapshot, StationSource, StatusSource};

/// Default station-information feed.
pub const DEFAULT_STATION_INFO_URL: &str =
    "https://gbfs.divvybikes.com/gbfs/en/station_information.json";

/// Default station-status feed.
pub const DEFAULT_STATION_STATUS_URL: &str =
    "https://gbfs.divvybikes.com/gbfs/en/station_status.json";

/// Anything that can produce a [`FeedSnapshot`].
///
/// Implemented by [`FeedClient`]; tests substitute in-process fakes.
pub trait FeedSource: fmt::Debug + Send + Sync {
    /// Fetches both feeds. Either both succeed or the whole call fails.
    fn fetch(&self) -> BoxFuture<'_, Result<FeedSnapshot, FeedError>>;
}

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Station-information feed URL.
    pub station_info_url: String,
    /// Station-status feed URL.
    pub station_status_url: String,
    /// Deadline covering both legs together.
    pub timeout: Duration,
}

impl FeedConfig {
    /// Creates a config for the given feed URLs with a 30 second deadline.
    pub fn new(station_info_url: impl Into<String>, station_status_url: impl Into<String>) -> Self {
        Self {
            station_info_url: station_info_url.into(),
            station_status_url: station_status_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the shared deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STATION_INFO_URL, DEFAULT_STATION_STATUS_URL)
    }
}

/// Feed client backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    config: FeedConfig,
}

impl FeedClient {
    /// Creates a feed client.
    ///
    /// # Errors
    ///
    /// Returns the [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(config: FeedConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    /// Fetches both feeds concurrently under the configured deadline.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] if either leg fails or the deadline elapses.
    pub async fn fetch_station_data(&self) -> Result<FeedSnapshot, FeedError> {
        let both = async {
            tokio::try_join!(
                self.fetch_json::<StationSource>(&self.config.station_info_url),
                self.fetch_json::<StatusSource>(&self.config.station_status_url),
            )
        };

        let (info, status) = tokio::time::timeout(self.config.timeout, both)
            .await
            .map_err(|_| FeedError::Timeout(self.config.timeout))??;

        tracing::info!(
            stations = info.data.stations.len(),
            statuses = status.data.stations.len(),
            "fetched station feeds"
        );

        Ok(FeedSnapshot {
            stations: info.data.stations,
            statuses: status.data.stations,
        })
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<FeedEnvelope<T>, FeedError> {
        let http_err = |source| FeedError::Http {
            url: url.to_string(),
            source,
        };

        let response = self.http.get(url).send().await.map_err(http_err)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(http_err)?;

        serde_json::from_str(&body).map_err(|e| FeedError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl FeedSource for FeedClient {
    fn fetch(&self) -> BoxFuture<'_, Result<FeedSnapshot, FeedError>> {
        self.fetch_station_data().boxed()
    }
}
