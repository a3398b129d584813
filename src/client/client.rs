use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::{Endpoint, LatestResponse, StatusResponse};

/// Transport-level failure. Distinct from a reachable service reporting
/// `connected: false`.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("transport failure on {endpoint:?}: {source}")]
    Transport {
        endpoint: Endpoint,
        source: reqwest::Error,
    },

    #[error("{endpoint:?} answered HTTP {status}")]
    Http { endpoint: Endpoint, status: u16 },

    #[error("invalid JSON from {endpoint:?}: {reason}")]
    Decode { endpoint: Endpoint, reason: String },
}

#[derive(Clone)]
pub struct PollClient {
    client: Client,
    base_url: String,
}

impl PollClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout) // a poll must never outlive a few periods
                .no_proxy() // the service sits on the vehicle's local network
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    pub async fn fetch_latest(&self) -> Result<LatestResponse, PollError> {
        self.get(Endpoint::Latest).await
    }

    pub async fn fetch_status(&self) -> Result<StatusResponse, PollError> {
        self.get(Endpoint::Status).await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: Endpoint) -> Result<T, PollError> {
        let response = self
            .client
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(|source| PollError::Transport { endpoint, source })?;

        if !response.status().is_success() {
            return Err(PollError::Http {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                PollError::Decode {
                    endpoint,
                    reason: e.to_string(),
                }
            } else {
                PollError::Transport { endpoint, source: e }
            }
        })
    }
}
