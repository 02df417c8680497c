//! Failure taxonomy for upstream calls and record normalization
//!
//! Provider-level and record-level failures are contained at their
//! boundary; only the classification lives here.

use thiserror::Error;

use crate::types::Provider;

/// Failure of one upstream HTTP call.
///
/// Only rate-limit and server-side failures are worth retrying; everything
/// else fails the call immediately and is contained by the caller as an
/// empty contribution from that provider.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{provider} rate limited the request")]
    RateLimited { provider: Provider },

    #[error("{provider} returned server error {status}")]
    Server { provider: Provider, status: u16 },

    #[error("{provider} rejected the request with status {status}")]
    Client { provider: Provider, status: u16 },

    #[error("request to {provider} failed: {source}")]
    Network {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected payload from {provider}: {reason}")]
    Payload { provider: Provider, reason: String },
}

impl FetchError {
    /// Classify a non-success HTTP status.
    pub fn from_status(provider: Provider, status: u16) -> Self {
        if status == 429 {
            FetchError::RateLimited { provider }
        } else if status >= 500 {
            FetchError::Server { provider, status }
        } else {
            FetchError::Client { provider, status }
        }
    }

    /// Transport-level failure (timeout, connect, TLS). Not retried: the
    /// per-call timeout already bounds slow upstreams, and an unreachable
    /// host rarely recovers within one request's budget.
    pub fn network(provider: Provider, source: reqwest::Error) -> Self {
        FetchError::Network { provider, source }
    }

    pub fn payload(provider: Provider, reason: impl Into<String>) -> Self {
        FetchError::Payload {
            provider,
            reason: reason.into(),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            FetchError::RateLimited { provider }
            | FetchError::Server { provider, .. }
            | FetchError::Client { provider, .. }
            | FetchError::Network { provider, .. }
            | FetchError::Payload { provider, .. } => *provider,
        }
    }

    /// Whether the retrying fetcher should attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::Server { .. }
        )
    }
}

/// A single provider record that could not be normalized. Dropped and
/// counted; sibling records are unaffected.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("record from {provider} has no token address")]
    MissingAddress { provider: Provider },

    #[error("record from {provider} is missing required field {field}")]
    MissingField {
        provider: Provider,
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(FetchError::from_status(Provider::DexScreener, 429).is_retryable());
        assert!(FetchError::from_status(Provider::DexScreener, 500).is_retryable());
        assert!(FetchError::from_status(Provider::DexScreener, 503).is_retryable());
    }

    #[test]
    fn client_and_payload_errors_fail_immediately() {
        assert!(!FetchError::from_status(Provider::GeckoTerminal, 400).is_retryable());
        assert!(!FetchError::from_status(Provider::GeckoTerminal, 404).is_retryable());
        assert!(!FetchError::payload(Provider::Jupiter, "not json").is_retryable());
    }

    #[test]
    fn status_classification_boundaries() {
        assert!(matches!(
            FetchError::from_status(Provider::DexScreener, 429),
            FetchError::RateLimited { .. }
        ));
        assert!(matches!(
            FetchError::from_status(Provider::DexScreener, 502),
            FetchError::Server { status: 502, .. }
        ));
        assert!(matches!(
            FetchError::from_status(Provider::DexScreener, 403),
            FetchError::Client { status: 403, .. }
        ));
    }
}
