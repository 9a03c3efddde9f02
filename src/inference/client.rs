//! HTTP client for the external prediction service.
//!
//! `POST /predict` returns a whole batch covering every station, which can
//! take minutes to compute, so this client uses a much longer timeout than
//! the feed client. Every batch is checked with
//! [`PredictionBatch::validate`] before it is handed to the caller.

use std::fmt;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;

use super::error::PredictionError;
use super::types::PredictionBatch;

/// Default prediction service location.
pub const DEFAULT_BASE_URL: &str = "http://ml:5000";

/// Longest response body excerpt kept in [`PredictionError::Status`].
const MAX_ERROR_BODY: usize = 500;

/// Free-form status document returned by `GET /status`.
pub type ServiceStatus = serde_json::Map<String, serde_json::Value>;

/// Access to the external prediction service.
pub trait PredictionGateway: fmt::Debug + Send + Sync {
    /// Requests a fresh prediction batch and validates it.
    fn get_predictions(&self) -> BoxFuture<'_, Result<PredictionBatch, PredictionError>>;

    /// Probes the service status.
    fn get_status(&self) -> BoxFuture<'_, Result<ServiceStatus, PredictionError>>;
}

/// Configuration for the prediction client.
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Service base URL, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl PredictionConfig {
    /// Creates a config for the given base URL with a five minute timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(5 * 60),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Prediction service client.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    base_url: String,
}

impl PredictionClient {
    /// Creates a prediction client.
    ///
    /// # Errors
    ///
    /// Returns the [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(config: PredictionConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    /// `POST /predict`, decoded and validated.
    ///
    /// # Errors
    ///
    /// Returns a [`PredictionError`] on transport failure, non-200 status,
    /// undecodable body, or a [`super::ContractViolation`].
    pub async fn predict(&self) -> Result<PredictionBatch, PredictionError> {
        let url = format!("{}/predict", self.base_url);
        let batch: PredictionBatch = self.send(self.http.post(&url), &url).await?;

        batch.validate()?;

        tracing::info!(
            predictions = batch.count,
            cached = batch.cached,
            "prediction batch received"
        );
        Ok(batch)
    }

    /// `GET /status`.
    ///
    /// # Errors
    ///
    /// Returns a [`PredictionError`] on transport failure, non-200 status,
    /// or a body that is not a JSON object.
    pub async fn status(&self) -> Result<ServiceStatus, PredictionError> {
        let url = format!("{}/status", self.base_url);
        self.send(self.http.get(&url), &url).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, PredictionError> {
        let http_err = |source| PredictionError::Http {
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(http_err)?;
        let status = response.status();
        let body = response.text().await.map_err(http_err)?;

        if status != reqwest::StatusCode::OK {
            return Err(PredictionError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| PredictionError::Decode(e.to_string()))
    }
}

impl PredictionGateway for PredictionClient {
    fn get_predictions(&self) -> BoxFuture<'_, Result<PredictionBatch, PredictionError>> {
        self.predict().boxed()
    }

    fn get_status(&self) -> BoxFuture<'_, Result<ServiceStatus, PredictionError>> {
        self.status().boxed()
    }
}
