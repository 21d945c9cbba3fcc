//! `reqwest` implementations of the external client traits.

use super::clients::{ActorClient, DatabaseClient, HttpClient};
use crate::errors::ActionError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const APIFY_BASE_URL: &str = "https://api.apify.com/v2";

fn build_client(timeout: Duration) -> Result<reqwest::Client, ActionError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ActionError::Http(e.to_string()))
}

/// Sends a prepared request and decodes the response body.
///
/// Non-2xx statuses become `ActionError::Http` carrying the status and
/// body. A body that is not JSON is returned as a string.
async fn send(request: reqwest::RequestBuilder) -> Result<Value, ActionError> {
    let response = request
        .send()
        .await
        .map_err(|e| ActionError::Http(e.to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ActionError::Http(e.to_string()))?;

    if !status.is_success() {
        return Err(ActionError::Http(format!("HTTP {}: {text}", status.as_u16())));
    }

    debug!(status = status.as_u16(), bytes = text.len(), "HTTP response");
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Plain JSON-over-HTTP client.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Creates a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, ActionError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &Value,
    ) -> Result<Value, ActionError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        send(request).await
    }
}

/// Database client speaking PostgREST, as exposed by Supabase.
///
/// Inserts go to `/rest/v1/<table>`; queries call the `execute_sql` RPC.
#[derive(Debug, Clone)]
pub struct RestDatabaseClient {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl RestDatabaseClient {
    /// Creates a client for the project at `base_url`.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(
        base_url: impl Into<String>,
        key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ActionError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/rest/v1/{path}", self.base_url))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }
}

#[async_trait]
impl DatabaseClient for RestDatabaseClient {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Value, ActionError> {
        let body = json!({ "query": sql, "params": params });
        send(self.post("rpc/execute_sql").json(&body)).await
    }

    async fn insert(&self, table: &str, rows: &Value) -> Result<Value, ActionError> {
        send(
            self.post(table)
                .header("Prefer", "return=representation")
                .json(rows),
        )
        .await
    }
}

/// Runs Apify actors through the synchronous dataset endpoint.
#[derive(Debug, Clone)]
pub struct ApifyActorClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ApifyActorClient {
    /// Creates a client authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, ActionError> {
        Ok(Self {
            client: build_client(timeout)?,
            token: token.into(),
            base_url: APIFY_BASE_URL.to_string(),
        })
    }

    /// Points the client at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn run_url(&self, actor: &str) -> String {
        format!(
            "{}/acts/{}/run-sync-get-dataset-items",
            self.base_url,
            actor.replace('/', "~")
        )
    }
}

#[async_trait]
impl ActorClient for ApifyActorClient {
    async fn run_actor(&self, actor: &str, input: &Value) -> Result<Value, ActionError> {
        let request = self
            .client
            .post(self.run_url(actor))
            .query(&[("token", self.token.as_str())])
            .json(input);
        send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_url_escapes_slash() {
        let client = ApifyActorClient::new("t", Duration::from_secs(1))
            .unwrap()
            .with_base_url("https://api.example.com/v2/");
        assert_eq!(
            client.run_url("apify/instagram-profile-scraper"),
            "https://api.example.com/v2/acts/apify~instagram-profile-scraper/run-sync-get-dataset-items"
        );
    }

    #[test]
    fn test_database_base_url_trimmed() {
        let client = RestDatabaseClient::new("https://db.example.com/", "k", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "https://db.example.com");
    }
}
