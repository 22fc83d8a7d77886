//! PostgREST client.
//!
//! Talks to `<url>/rest/v1/<table>` for rows and `<url>/rest/v1/rpc/<fn>`
//! for procedures, authenticating with the project API key.

use super::store::{RowQuery, RowStore};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::models::Entity;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP row store.
pub struct RestClient {
    base_url: String,
    api_key: String,
    timeout_seconds: u64,
    http: reqwest::Client,
}

impl RestClient {
    /// Build a client from the backend section of the config.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        if config.url.trim().is_empty() {
            return Err(BackendError::NotConfigured("backend url"));
        }
        if config.api_key.trim().is_empty() {
            return Err(BackendError::NotConfigured("api key"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BackendError::Request(e.to_string()))?;

        Ok(Self {
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            timeout_seconds: config.timeout_seconds,
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout_seconds)
            } else if e.is_connect() {
                BackendError::Connect(self.base_url.clone())
            } else {
                BackendError::Request(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        Ok(response)
    }

    async fn json(&self, response: Response, what: &str) -> Result<Value, BackendError> {
        response.json().await.map_err(|e| BackendError::Decode {
            what: what.to_string(),
            message: e.to_string(),
        })
    }

    /// PostgREST answers writes with an array when asked for the
    /// representation; unwrap the single row.
    fn single_row(value: Value, entity: Entity, id: &str) -> Result<Value, BackendError> {
        match value {
            Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
            Value::Array(_) => Err(BackendError::NotFound {
                table: entity.table().to_string(),
                id: id.to_string(),
            }),
            other => Ok(other),
        }
    }
}

impl RowStore for RestClient {
    async fn select(&self, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        let params = query.to_params();
        debug!("GET {} {:?}", query.entity.table(), params);

        let request = self
            .request(Method::GET, query.entity.table())
            .query(&params);
        let response = self.send(request).await?;

        match self.json(response, query.entity.table()).await? {
            Value::Array(rows) => Ok(rows),
            other => Err(BackendError::Decode {
                what: query.entity.table().to_string(),
                message: format!("expected an array of rows, got {}", other),
            }),
        }
    }

    async fn call(&self, procedure: &str, args: &Value) -> Result<Value, BackendError> {
        debug!("RPC {}", procedure);
        let request = self
            .request(Method::POST, &format!("rpc/{}", procedure))
            .json(args);
        let response = self.send(request).await?;
        self.json(response, procedure).await
    }

    async fn insert(&self, entity: Entity, row: &Value) -> Result<Value, BackendError> {
        debug!("INSERT {}", entity.table());
        let request = self
            .request(Method::POST, entity.table())
            .header("Prefer", "return=representation")
            .json(row);
        let response = self.send(request).await?;
        let body = self.json(response, entity.table()).await?;
        Self::single_row(body, entity, "new")
    }

    async fn insert_many(&self, entity: Entity, rows: &[Value]) -> Result<Vec<Value>, BackendError> {
        debug!("INSERT {} x{}", entity.table(), rows.len());
        let request = self
            .request(Method::POST, entity.table())
            .header("Prefer", "return=representation")
            .json(rows);
        let response = self.send(request).await?;

        match self.json(response, entity.table()).await? {
            Value::Array(stored) => Ok(stored),
            other => Err(BackendError::Decode {
                what: entity.table().to_string(),
                message: format!("expected an array of rows, got {}", other),
            }),
        }
    }

    async fn update(&self, entity: Entity, id: &str, patch: &Value) -> Result<Value, BackendError> {
        debug!("PATCH {} {}", entity.table(), id);
        let request = self
            .request(Method::PATCH, entity.table())
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(patch);
        let response = self.send(request).await?;
        let body = self.json(response, entity.table()).await?;
        Self::single_row(body, entity, id)
    }

    async fn delete(&self, entity: Entity, id: &str) -> Result<(), BackendError> {
        debug!("DELETE {} {}", entity.table(), id);
        let request = self
            .request(Method::DELETE, entity.table())
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let response = self.send(request).await?;
        let body = self.json(response, entity.table()).await?;
        Self::single_row(body, entity, id).map(|_| ())
    }
}
