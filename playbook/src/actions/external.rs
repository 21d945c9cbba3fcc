//! Actions that reach outside the process: files, HTTP, database, MCP.

use super::clients::{ActorClient, DatabaseClient, ExternalClients, HttpClient, McpClient};
use super::params::Params;
use super::registry::{Action, ActionRegistry};
use crate::context::{RunContext, ThrottleSpec};
use crate::core::value::{as_usize, render, sequence_len};
use crate::errors::ActionError;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub(super) fn register(registry: &mut ActionRegistry, clients: &ExternalClients) {
    registry.register(ReadCsvAction);
    registry.register(HttpPostAction {
        client: clients.http.clone(),
    });
    registry.register(SupabaseQueryAction {
        client: clients.database.clone(),
    });
    registry.register(SupabaseInsertAction {
        client: clients.database.clone(),
    });
    registry.register(McpToolAction {
        client: clients.mcp.clone(),
        actors: clients.actors.clone(),
    });
}

/// Waits for a throttle token, giving up if the run is cancelled.
async fn throttle(ctx: &mut RunContext, spec: &ThrottleSpec) -> Result<(), ActionError> {
    let token = Arc::clone(ctx.cancellation());
    tokio::select! {
        _ = ctx.throttles.acquire(spec) => Ok(()),
        () = token.cancelled() => Err(ActionError::Cancelled(
            token.reason().unwrap_or_else(|| "run cancelled".to_string()),
        )),
    }
}

/// `read_csv {file, filter?}`
///
/// Reads a CSV file with a header row into an array of string-valued
/// objects. Filter values are matched like `filter_collection`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadCsvAction;

impl ReadCsvAction {
    fn parse(bytes: &[u8], filter: &Map<String, Value>) -> Result<Vec<Value>, ActionError> {
        let mut reader = csv::Reader::from_reader(bytes);
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        let mut total = 0usize;
        for record in reader.records() {
            let record = record?;
            total += 1;
            let row: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
                .collect();

            let keep = filter.iter().all(|(field, expected)| {
                let cell = row.get(field);
                match expected {
                    Value::Array(allowed) => cell.is_some_and(|c| allowed.contains(c)),
                    Value::String(_) => cell == Some(expected),
                    other => cell.and_then(Value::as_str) == Some(render(other).as_str()),
                }
            });
            if keep {
                rows.push(Value::Object(row));
            }
        }

        info!(rows = rows.len(), total, "Read CSV");
        Ok(rows)
    }
}

#[async_trait]
impl Action for ReadCsvAction {
    fn name(&self) -> &str {
        "read_csv"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        _ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let file = p.required_str("file")?;
        let filter = p.object("filter")?.cloned().unwrap_or_default();

        let bytes = tokio::fs::read(file).await?;
        Self::parse(&bytes, &filter).map(Value::Array)
    }
}

/// `http_post {url, data?, headers?, throttle?}`
#[derive(Clone)]
pub struct HttpPostAction {
    client: Option<Arc<dyn HttpClient>>,
}

#[async_trait]
impl Action for HttpPostAction {
    fn name(&self) -> &str {
        "http_post"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let url = p.required_str("url")?;
        let body = params.get("data").cloned().unwrap_or(Value::Null);
        let headers: HashMap<String, String> = p
            .object("headers")?
            .map(|h| h.iter().map(|(k, v)| (k.clone(), render(v))).collect())
            .unwrap_or_default();

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ActionError::handler("http_post: no HTTP client configured"))?;

        if let Some(value) = p.get("throttle") {
            if let Some(spec) = ThrottleSpec::from_param(self.name(), value, url, None)? {
                throttle(ctx, &spec).await?;
            }
        }

        info!(url = %url, "POST");
        let response = client.post_json(url, &headers, &body).await?;
        Ok(response)
    }
}

/// `supabase_query {query, params?}`
#[derive(Clone)]
pub struct SupabaseQueryAction {
    client: Option<Arc<dyn DatabaseClient>>,
}

#[async_trait]
impl Action for SupabaseQueryAction {
    fn name(&self) -> &str {
        "supabase_query"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        _ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let client = database(self.client.as_ref(), self.name())?;
        let sql = p.required_str("query")?;
        let query_params = match p.get("params") {
            Some(Value::Array(values)) => values.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        };

        let result = client.query(sql, &query_params).await?;
        let rows = match result {
            Value::Object(mut map) if map.contains_key("rows") => {
                map.remove("rows").unwrap_or(Value::Null)
            }
            other => other,
        };

        info!(rows = sequence_len(Some(&rows)), "Query executed");
        Ok(rows)
    }
}

/// `supabase_insert {table, data}`
#[derive(Clone)]
pub struct SupabaseInsertAction {
    client: Option<Arc<dyn DatabaseClient>>,
}

#[async_trait]
impl Action for SupabaseInsertAction {
    fn name(&self) -> &str {
        "supabase_insert"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let client = database(self.client.as_ref(), self.name())?;
        let table = p.required_str("table")?;
        let rows = p.required("data")?;

        let inserted = client.insert(table, rows).await?;
        let count = match &inserted {
            Value::Array(items) => items.len(),
            _ => 1,
        };
        ctx.record_processed(count);

        info!(table = %table, count, "Inserted records");
        Ok(inserted)
    }
}

fn database<'a>(
    client: Option<&'a Arc<dyn DatabaseClient>>,
    action: &str,
) -> Result<&'a Arc<dyn DatabaseClient>, ActionError> {
    client.ok_or_else(|| {
        ActionError::handler(format!(
            "{action}: database client not configured (set SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY)"
        ))
    })
}

/// `mcp_tool {server, tool, arguments?, throttle?}`
///
/// `call-actor` on a server whose name contains `apify` runs the actor
/// directly through the actor client. Other tools go to the MCP client, or
/// return a simulated response when none is configured.
#[derive(Clone)]
pub struct McpToolAction {
    client: Option<Arc<dyn McpClient>>,
    actors: Option<Arc<dyn ActorClient>>,
}

impl McpToolAction {
    const DEFAULT_RPS: f64 = 1.0;

    fn throttle_spec(
        &self,
        value: &Value,
        server: &str,
        tool: &str,
        env: &HashMap<String, String>,
    ) -> Result<Option<ThrottleSpec>, ActionError> {
        let default_rps = env
            .get("MCP_APIFY_RPS")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(Self::DEFAULT_RPS);
        let key = format!("mcp_{server}_{tool}");

        let mut spec = ThrottleSpec::from_param(self.name(), value, &key, Some(default_rps))?;
        if let Some(spec) = spec.as_mut() {
            let explicit_burst = value.get("burst").is_some();
            let env_burst = env
                .get("MCP_APIFY_BURST")
                .and_then(|v| as_usize(&Value::String(v.clone())))
                .and_then(|b| u32::try_from(b).ok());
            if let (false, Some(burst)) = (explicit_burst, env_burst) {
                spec.burst = burst.max(1);
            }
        }
        Ok(spec)
    }

    async fn run_actor(&self, arguments: &Value, ctx: &mut RunContext) -> Result<Value, ActionError> {
        let actors = self.actors.as_ref().ok_or_else(|| {
            ActionError::handler("mcp_tool: actor client not configured (set APIFY_API_TOKEN)")
        })?;
        let actor = arguments
            .get("actor")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ActionError::missing(self.name(), "arguments.actor"))?;
        let input = arguments.get("input").cloned().unwrap_or_else(|| json!({}));

        if actor.contains("instagram") && sequence_len(input.get("usernames")) == 0 {
            warn!(actor = %actor, "No usernames provided for actor");
            return Ok(Value::Array(Vec::new()));
        }

        info!(actor = %actor, "Running actor");
        let items = actors.run_actor(actor, &input).await?;
        let count = sequence_len(Some(&items));
        ctx.record_processed(count);
        info!(actor = %actor, count, "Actor finished");
        Ok(items)
    }
}

#[async_trait]
impl Action for McpToolAction {
    fn name(&self) -> &str {
        "mcp_tool"
    }

    async fn execute(
        &self,
        params: &Map<String, Value>,
        ctx: &mut RunContext,
    ) -> Result<Value, ActionError> {
        let p = Params::new(self.name(), params);
        let server = p.required_str("server")?;
        let tool = p.required_str("tool")?;
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        if let Some(value) = p.get("throttle") {
            if let Some(spec) = self.throttle_spec(value, server, tool, &ctx.environment)? {
                throttle(ctx, &spec).await?;
            }
        }

        info!(server = %server, tool = %tool, "MCP tool call");
        if server.contains("apify") && tool == "call-actor" {
            return self.run_actor(&arguments, ctx).await;
        }

        match &self.client {
            Some(client) => client.call_tool(server, tool, &arguments).await,
            None => {
                warn!(server = %server, tool = %tool, "No MCP client configured, simulating call");
                Ok(json!({
                    "success": true,
                    "simulated": true,
                    "server": server,
                    "tool": tool,
                    "arguments": arguments,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::clients::{MockActorClient, MockDatabaseClient, MockHttpClient, MockMcpClient};
    use super::*;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn ctx() -> RunContext {
        RunContext::new(HashMap::new(), Map::new())
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_read_csv_with_filter() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,city,kind").unwrap();
        writeln!(file, "Bloom,Austin,florist").unwrap();
        writeln!(file, "Feast,Austin,caterer").unwrap();
        writeln!(file, "Petal,Dallas,florist").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let out = ReadCsvAction
            .execute(
                &params(json!({"file": path, "filter": {"city": "Austin", "kind": ["florist"]}})),
                &mut ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, json!([{"name": "Bloom", "city": "Austin", "kind": "florist"}]));
    }

    #[tokio::test]
    async fn test_read_csv_missing_file() {
        let err = ReadCsvAction
            .execute(&params(json!({"file": "/definitely/not/here.csv"})), &mut ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Io(_)));
    }

    #[tokio::test]
    async fn test_http_post_passes_headers_and_body() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json()
            .withf(|url, headers, body| {
                url == "https://hooks.example.com/in"
                    && headers.get("X-Token").map(String::as_str) == Some("abc")
                    && body == &json!({"n": 1})
            })
            .times(1)
            .returning(|_, _, _| Ok(json!({"ok": true})));

        let action = HttpPostAction {
            client: Some(Arc::new(mock)),
        };
        let out = action
            .execute(
                &params(json!({
                    "url": "https://hooks.example.com/in",
                    "data": {"n": 1},
                    "headers": {"X-Token": "abc"}
                })),
                &mut ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_http_post_propagates_failure() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json()
            .returning(|_, _, _| Err(ActionError::Http("HTTP 500: boom".to_string())));
        let action = HttpPostAction {
            client: Some(Arc::new(mock)),
        };
        let err = action
            .execute(&params(json!({"url": "https://x"})), &mut ctx())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: boom");
    }

    #[tokio::test]
    async fn test_http_post_throttle_creates_limiter() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json().times(2).returning(|_, _, _| Ok(Value::Null));
        let action = HttpPostAction {
            client: Some(Arc::new(mock)),
        };
        let mut ctx = ctx();
        let p = params(json!({"url": "https://x", "throttle": {"rps": 5, "key": "hooks"}}));
        action.execute(&p, &mut ctx).await.unwrap();
        action.execute(&p, &mut ctx).await.unwrap();
        assert_eq!(ctx.throttles.len(), 1);
    }

    #[tokio::test]
    async fn test_throttle_wait_is_cancellable() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json().times(1).returning(|_, _, _| Ok(Value::Null));
        let action = HttpPostAction {
            client: Some(Arc::new(mock)),
        };
        let mut ctx = ctx();
        let p = params(json!({"url": "https://x", "throttle": {"rps": 0.1, "burst": 1}}));
        action.execute(&p, &mut ctx).await.unwrap();

        ctx.cancellation().cancel("stop");
        let err = action.execute(&p, &mut ctx).await.unwrap_err();
        assert!(matches!(err, ActionError::Cancelled(reason) if reason == "stop"));
    }

    #[tokio::test]
    async fn test_supabase_without_client_is_error() {
        let action = SupabaseInsertAction { client: None };
        let err = action
            .execute(&params(json!({"table": "vendors", "data": []})), &mut ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("database client not configured"));
    }

    #[tokio::test]
    async fn test_supabase_insert_counts_records() {
        let mut mock = MockDatabaseClient::new();
        mock.expect_insert()
            .with(eq("vendors"), eq(json!([{"id": 1}, {"id": 2}])))
            .returning(|_, rows| Ok(rows.clone()));
        let action = SupabaseInsertAction {
            client: Some(Arc::new(mock)),
        };
        let mut ctx = ctx();
        let out = action
            .execute(
                &params(json!({"table": "vendors", "data": [{"id": 1}, {"id": 2}]})),
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(out, json!([{"id": 1}, {"id": 2}]));
        assert_eq!(ctx.records_processed(), 2);
    }

    #[tokio::test]
    async fn test_supabase_query_unwraps_rows() {
        let mut mock = MockDatabaseClient::new();
        mock.expect_query()
            .returning(|_, _| Ok(json!({"rows": [{"n": 1}]})));
        let action = SupabaseQueryAction {
            client: Some(Arc::new(mock)),
        };
        let out = action
            .execute(&params(json!({"query": "select 1 as n"})), &mut ctx())
            .await
            .unwrap();
        assert_eq!(out, json!([{"n": 1}]));
    }

    #[tokio::test]
    async fn test_mcp_simulated_without_client() {
        let action = McpToolAction {
            client: None,
            actors: None,
        };
        let out = action
            .execute(
                &params(json!({"server": "search", "tool": "lookup", "arguments": {"q": "x"}})),
                &mut ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out["simulated"], json!(true));
        assert_eq!(out["arguments"], json!({"q": "x"}));
    }

    #[tokio::test]
    async fn test_mcp_forwards_to_client() {
        let mut mock = MockMcpClient::new();
        mock.expect_call_tool()
            .with(eq("search"), eq("lookup"), eq(json!({"q": "x"})))
            .returning(|_, _, _| Ok(json!({"hits": 3})));
        let action = McpToolAction {
            client: Some(Arc::new(mock)),
            actors: None,
        };
        let out = action
            .execute(
                &params(json!({"server": "search", "tool": "lookup", "arguments": {"q": "x"}})),
                &mut ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, json!({"hits": 3}));
    }

    #[tokio::test]
    async fn test_mcp_actor_call() {
        let mut mock = MockActorClient::new();
        mock.expect_run_actor()
            .with(
                eq("apify/instagram-profile-scraper"),
                eq(json!({"usernames": ["a", "b"]})),
            )
            .returning(|_, _| Ok(json!([{"username": "a"}, {"username": "b"}])));
        let action = McpToolAction {
            client: None,
            actors: Some(Arc::new(mock)),
        };
        let mut ctx = ctx();
        let out = action
            .execute(
                &params(json!({
                    "server": "github.com/apify/actors-mcp-server",
                    "tool": "call-actor",
                    "arguments": {
                        "actor": "apify/instagram-profile-scraper",
                        "input": {"usernames": ["a", "b"]}
                    }
                })),
                &mut ctx,
            )
            .await
            .unwrap();
        assert_eq!(out.as_array().map(Vec::len), Some(2));
        assert_eq!(ctx.records_processed(), 2);
    }

    #[tokio::test]
    async fn test_mcp_instagram_without_usernames_is_empty() {
        let mut mock = MockActorClient::new();
        mock.expect_run_actor().times(0);
        let action = McpToolAction {
            client: None,
            actors: Some(Arc::new(mock)),
        };
        let out = action
            .execute(
                &params(json!({
                    "server": "apify",
                    "tool": "call-actor",
                    "arguments": {"actor": "apify/instagram-scraper", "input": {"usernames": []}}
                })),
                &mut ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, json!([]));
    }

    #[tokio::test]
    async fn test_mcp_actor_without_client_is_error() {
        let action = McpToolAction {
            client: None,
            actors: None,
        };
        let err = action
            .execute(
                &params(json!({"server": "apify", "tool": "call-actor", "arguments": {"actor": "x"}})),
                &mut ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Handler(_)));
    }

    #[test]
    fn test_mcp_throttle_defaults_from_env() {
        let action = McpToolAction {
            client: None,
            actors: None,
        };
        let mut env = HashMap::new();
        env.insert("MCP_APIFY_RPS".to_string(), "0.5".to_string());
        env.insert("MCP_APIFY_BURST".to_string(), "7".to_string());

        let spec = action
            .throttle_spec(&json!({}), "apify", "call-actor", &env)
            .unwrap()
            .unwrap();
        assert_eq!(spec, ThrottleSpec::new(0.5, 7, "mcp_apify_call-actor"));

        let spec = action
            .throttle_spec(&json!({"burst": 2}), "apify", "call-actor", &env)
            .unwrap()
            .unwrap();
        assert_eq!(spec.burst, 2);
    }
}
