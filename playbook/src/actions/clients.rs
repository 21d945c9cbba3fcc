//! Seams to external systems used by the integration actions.
//!
//! Each system sits behind a small async trait so that runs can be tested
//! with mocks and deployments can swap implementations. The `http` feature
//! provides `reqwest`-backed defaults.

use crate::errors::ActionError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout for outbound HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts JSON to arbitrary URLs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends `body` as JSON. Returns the parsed JSON response, or the raw
    /// body as a string if it is not JSON.
    async fn post_json(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: &Value,
    ) -> Result<Value, ActionError>;
}

/// Reads and writes a relational store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Runs a SQL query and returns its rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Value, ActionError>;

    /// Inserts `rows` (an object or an array of objects) into `table` and
    /// returns the inserted records.
    async fn insert(&self, table: &str, rows: &Value) -> Result<Value, ActionError>;
}

/// Calls tools on MCP servers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Invokes `tool` on `server` with `arguments`.
    async fn call_tool(&self, server: &str, tool: &str, arguments: &Value)
        -> Result<Value, ActionError>;
}

/// Runs hosted scraping actors synchronously and returns their dataset.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActorClient: Send + Sync {
    /// Runs `actor` with `input` and returns the dataset items.
    async fn run_actor(&self, actor: &str, input: &Value) -> Result<Value, ActionError>;
}

/// The external clients available to a registry.
///
/// A missing client makes the corresponding actions fail with a handler
/// error, except MCP tools, which fall back to a simulated response.
#[derive(Clone)]
pub struct ExternalClients {
    /// Backs `http_post`.
    pub http: Option<Arc<dyn HttpClient>>,
    /// Backs `supabase_query` and `supabase_insert`.
    pub database: Option<Arc<dyn DatabaseClient>>,
    /// Backs `mcp_tool`.
    pub mcp: Option<Arc<dyn McpClient>>,
    /// Backs `mcp_tool` calls to actor servers.
    pub actors: Option<Arc<dyn ActorClient>>,
}

impl Default for ExternalClients {
    /// Only the generic HTTP client is configured by default.
    fn default() -> Self {
        Self {
            http: default_http_client(),
            database: None,
            mcp: None,
            actors: None,
        }
    }
}

impl ExternalClients {
    /// Returns a set with no clients at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            http: None,
            database: None,
            mcp: None,
            actors: None,
        }
    }

    /// Builds clients from an environment snapshot.
    ///
    /// The database client needs a URL (`SUPABASE_URL`, `VITE_SUPABASE_URL`
    /// or `NEXT_PUBLIC_SUPABASE_URL`) and a key (`SUPABASE_SERVICE_ROLE_KEY`,
    /// `SUPABASE_SERVICE_ROLE` or `VITE_SUPABASE_ANON_KEY`). The actor client
    /// needs `APIFY_API_TOKEN`.
    #[must_use]
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let mut clients = Self::default();

        #[cfg(feature = "http")]
        {
            use super::rest::{ApifyActorClient, RestDatabaseClient};

            let url = first_set(
                env,
                &["SUPABASE_URL", "VITE_SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"],
            );
            let key = first_set(
                env,
                &[
                    "SUPABASE_SERVICE_ROLE_KEY",
                    "SUPABASE_SERVICE_ROLE",
                    "VITE_SUPABASE_ANON_KEY",
                ],
            );
            if let (Some(url), Some(key)) = (url, key) {
                match RestDatabaseClient::new(url, key, DEFAULT_HTTP_TIMEOUT) {
                    Ok(client) => clients.database = Some(Arc::new(client)),
                    Err(e) => tracing::warn!(error = %e, "Could not build database client"),
                }
            }

            if let Some(token) = first_set(env, &["APIFY_API_TOKEN"]) {
                match ApifyActorClient::new(token, DEFAULT_HTTP_TIMEOUT) {
                    Ok(client) => clients.actors = Some(Arc::new(client)),
                    Err(e) => tracing::warn!(error = %e, "Could not build actor client"),
                }
            }
        }
        #[cfg(not(feature = "http"))]
        let _ = env;

        clients
    }

    /// Sets the HTTP client.
    #[must_use]
    pub fn with_http(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http = Some(client);
        self
    }

    /// Sets the database client.
    #[must_use]
    pub fn with_database(mut self, client: Arc<dyn DatabaseClient>) -> Self {
        self.database = Some(client);
        self
    }

    /// Sets the MCP client.
    #[must_use]
    pub fn with_mcp(mut self, client: Arc<dyn McpClient>) -> Self {
        self.mcp = Some(client);
        self
    }

    /// Sets the actor client.
    #[must_use]
    pub fn with_actors(mut self, client: Arc<dyn ActorClient>) -> Self {
        self.actors = Some(client);
        self
    }
}

impl std::fmt::Debug for ExternalClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalClients")
            .field("http", &self.http.is_some())
            .field("database", &self.database.is_some())
            .field("mcp", &self.mcp.is_some())
            .field("actors", &self.actors.is_some())
            .finish()
    }
}

#[cfg(feature = "http")]
fn default_http_client() -> Option<Arc<dyn HttpClient>> {
    match super::rest::ReqwestHttpClient::new(DEFAULT_HTTP_TIMEOUT) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Could not build HTTP client");
            None
        }
    }
}

#[cfg(not(feature = "http"))]
fn default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

#[cfg_attr(not(feature = "http"), allow(dead_code))]
fn first_set<'a>(env: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| env.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_first_set_skips_blank_values() {
        let env = env(&[("A", "  "), ("B", "value")]);
        assert_eq!(first_set(&env, &["A", "B"]), Some("value"));
        assert_eq!(first_set(&env, &["C"]), None);
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_from_env_builds_configured_clients() {
        let clients = ExternalClients::from_env(&env(&[
            ("VITE_SUPABASE_URL", "https://db.example.com"),
            ("SUPABASE_SERVICE_ROLE", "secret"),
            ("APIFY_API_TOKEN", "tok"),
        ]));
        assert!(clients.http.is_some());
        assert!(clients.database.is_some());
        assert!(clients.actors.is_some());
        assert!(clients.mcp.is_none());
    }

    #[test]
    fn test_from_env_without_credentials() {
        let clients = ExternalClients::from_env(&env(&[("SUPABASE_URL", "https://db")]));
        assert!(clients.database.is_none());
        assert!(clients.actors.is_none());
    }

    #[test]
    fn test_none_has_no_clients() {
        let clients = ExternalClients::none();
        assert_eq!(
            format!("{clients:?}"),
            "ExternalClients { http: false, database: false, mcp: false, actors: false }"
        );
    }
}
