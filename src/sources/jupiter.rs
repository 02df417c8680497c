//! Jupiter price lookup: the price-only enrichment source
//!
//! Never contributes structural fields; the merge engine uses these
//! prices solely to fill a still-null `price_usd`.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::http_client;
use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::fetch::{retry_with_backoff, RetryPolicy};
use crate::types::Provider;

const PROVIDER: Provider = Provider::Jupiter;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: HashMap<String, RawPrice>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    price: Option<f64>,
}

pub struct JupiterClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl JupiterClient {
    pub fn new(cfg: &ProviderConfig) -> Self {
        Self {
            client: http_client(cfg.timeout_ms),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::from(cfg),
        }
    }

    /// USD prices for the given addresses. Addresses Jupiter does not
    /// know are simply absent from the result.
    pub async fn prices(&self, addresses: &[String]) -> Result<HashMap<String, f64>, FetchError> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/price", self.base_url);
        let ids = addresses.join(",");
        let url = url.as_str();
        let ids = ids.as_str();
        let client = &self.client;
        retry_with_backoff(self.policy, move || async move {
            let resp = client
                .get(url)
                .query(&[("ids", ids)])
                .send()
                .await
                .map_err(|e| FetchError::network(PROVIDER, e))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::from_status(PROVIDER, status.as_u16()));
            }

            let body: PriceResponse = resp
                .json()
                .await
                .map_err(|e| FetchError::payload(PROVIDER, e.to_string()))?;

            let prices = body
                .data
                .into_iter()
                .filter_map(|(addr, raw)| raw.price.map(|p| (addr, p)))
                .collect();
            Ok(prices)
        })
        .await
    }
}
