//! Authenticated HTTP access to the Spotify Web API.
//!
//! The [`Connection`] is the single place the crate talks to the network.
//! It owns the access token, the base URL and the retry behavior for
//! transient upstream failures; the cache and the client facade only ever
//! call [`Connection::execute`].

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio::time::sleep;

use crate::{Res, config, error::CacheError, warning};

/// An authenticated session against one Spotify Web API base URL.
#[derive(Debug, Clone)]
pub struct Connection {
    client: Client,
    api_url: String,
    token: String,
}

impl Connection {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    /// Builds a connection against the base URL from the environment
    /// (`SPOTIFY_API_URL`, defaulting to the production endpoint).
    pub fn from_env(token: impl Into<String>) -> Self {
        Self::new(config::api_url(), token)
    }

    /// Appends query parameters to an endpoint, respecting any query string
    /// already present.
    pub fn add_query_parameters(endpoint: &str, params: &[(&str, String)]) -> String {
        if params.is_empty() {
            return endpoint.to_string();
        }
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{endpoint}{separator}{query}")
    }

    /// Performs one authenticated request and returns the JSON payload.
    ///
    /// Retries 502 Bad Gateway responses after a 10 second delay and honors
    /// the `Retry-After` header on 429 responses for delays up to 120
    /// seconds. Every other failure surfaces as [`CacheError::Transport`].
    /// A 204 No Content response yields `Value::Null`.
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Res<Value> {
        let url = format!("{}/{}", self.api_url.trim_end_matches('/'), endpoint);

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.token);
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => return Err(err.into()),
            };

            // check for retry-after header
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(0);
                if retry_after <= 120 {
                    sleep(Duration::from_secs(retry_after)).await;
                    continue;
                }
                warning!(
                    "Retry after has reached an abnormal high of {} seconds.",
                    retry_after
                );
                return Err(CacheError::Transport {
                    status: Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
                    message: format!("rate limited for {retry_after} seconds"),
                });
            }

            let response = match response.error_for_status() {
                Ok(valid_response) => valid_response,
                Err(err) => {
                    if err.status() == Some(StatusCode::BAD_GATEWAY) {
                        sleep(Duration::from_secs(10)).await;
                        continue; // retry
                    }
                    return Err(err.into()); // propagate other errors
                }
            };

            if response.status() == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return response.json::<Value>().await.map_err(CacheError::from);
        }
    }
}
