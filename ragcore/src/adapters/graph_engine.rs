//! Neo4j-style graph engine adapter: executes a generated Cypher statement
//! over HTTP and returns rows, capped and time-bounded per call.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::GraphEngineError;

/// One row of a graph query result, keyed by the statement's `RETURN` aliases.
pub type GraphRow = serde_json::Map<String, Value>;

#[async_trait]
pub trait GraphEngine: Send + Sync {
    /// Executes `statement` with `params`, capped at `row_limit` rows and
    /// `timeout`. A statement returning more rows than `row_limit` is
    /// truncated, not rejected.
    async fn execute(
        &self,
        statement: &str,
        params: &Value,
        row_limit: usize,
        timeout: Duration,
    ) -> Result<Vec<GraphRow>, GraphEngineError>;

    async fn ping(&self) -> Result<(), GraphEngineError>;
}

/// `GraphEngine` over Neo4j's HTTP transactional Cypher endpoint
/// (`POST /db/{database}/tx/commit`).
pub struct Neo4jGraphEngine {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl Neo4jGraphEngine {
    pub fn new(base_url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    fn commit_url(&self) -> String {
        format!("{}/db/neo4j/tx/commit", self.base_url.trim_end_matches('/'))
    }
}

fn rows_from_response(body: &Value) -> Vec<GraphRow> {
    let Some(result) = body.get("results").and_then(Value::as_array).and_then(|r| r.first()) else {
        return Vec::new();
    };
    let columns: Vec<String> = result
        .get("columns")
        .and_then(Value::as_array)
        .map(|c| c.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let data = result.get("data").and_then(Value::as_array).cloned().unwrap_or_default();

    data.into_iter()
        .filter_map(|entry| {
            let row = entry.get("row")?.as_array()?.clone();
            let mut map = GraphRow::new();
            for (col, val) in columns.iter().zip(row.into_iter()) {
                map.insert(col.clone(), val);
            }
            Some(map)
        })
        .collect()
}

#[async_trait]
impl GraphEngine for Neo4jGraphEngine {
    async fn execute(
        &self,
        statement: &str,
        params: &Value,
        row_limit: usize,
        timeout: Duration,
    ) -> Result<Vec<GraphRow>, GraphEngineError> {
        let body = json!({ "statements": [{ "statement": statement, "parameters": params }] });

        let response = self
            .client
            .post(self.commit_url())
            .basic_auth(&self.user, Some(&self.password))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GraphEngineError::Timeout
                } else {
                    GraphEngineError::Query(e.to_string())
                }
            })?
            .error_for_status()
            .map_err(|e| GraphEngineError::Query(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| GraphEngineError::Query(e.to_string()))?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if let Some(first) = errors.first() {
                let message = first.get("message").and_then(Value::as_str).unwrap_or("graph query error");
                return Err(GraphEngineError::Query(message.to_string()));
            }
        }

        let mut rows = rows_from_response(&response);
        rows.truncate(row_limit);
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), GraphEngineError> {
        self.client
            .get(format!("{}/", self.base_url.trim_end_matches('/')))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| GraphEngineError::Query(e.to_string()))?
            .error_for_status()
            .map_err(|e| GraphEngineError::Query(e.to_string()))?;
        Ok(())
    }
}
