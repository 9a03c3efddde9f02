//! Prediction service error types.

use super::types::ContractViolation;

/// Errors from calling the prediction service.
#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    /// Network failure or client-side timeout.
    #[error("prediction service request to {url} failed: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-200 status.
    #[error("prediction service error {status}: {body}")]
    Status {
        /// Returned status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The body could not be decoded.
    #[error("decode prediction service response: {0}")]
    Decode(String),

    /// The decoded batch broke the response contract.
    #[error("invalid prediction response: {0}")]
    Contract(#[from] ContractViolation),
}

impl PredictionError {
    /// Returns `true` for response-contract violations, as opposed to
    /// transport or decoding failures.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract(_))
    }
}
