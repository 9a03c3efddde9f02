//! Feed client error types.

use std::time::Duration;

/// Errors from fetching the station feeds.
///
/// Any one leg failing fails the combined fetch; the error names the URL
/// of the leg that failed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Feed URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The feed answered with a non-200 status.
    #[error("feed {url} returned HTTP {status}")]
    Status {
        /// Feed URL.
        url: String,
        /// Returned status code.
        status: u16,
    },

    /// The body did not match the `{data:{stations:[...]}}` envelope.
    #[error("feed {url} returned malformed JSON: {message}")]
    Decode {
        /// Feed URL.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// The shared deadline for both legs elapsed.
    #[error("feed fetch exceeded {0:?}")]
    Timeout(Duration),
}
