//! # Optimizer Client
//!
//! The per-stage AI optimizer behind an async trait.
//!
//! `HttpOptimizer` POSTs a node's attributes to
//! `{base_url}/ai/optimize/{stage_key}` and expects
//! `{"status": "success", "data": {...}}` back.

use crate::config::OptimizerConfig;
use async_trait::async_trait;
use carbonflow_core::Stage;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Errors from one optimizer call. Never fatal to a batch.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Cannot reach the optimizer.
    #[error("Cannot connect to optimizer at {0}")]
    ConnectionFailed(String),

    /// 401 Unauthorized - invalid or missing API key.
    #[error("Unauthorized: invalid or missing API key")]
    Unauthorized,

    /// 429 Too Many Requests.
    #[error("Rate limited: too many requests")]
    RateLimited,

    /// The optimizer answered with an error status.
    #[error("Optimizer error ({0}): {1}")]
    ServerError(u16, String),

    /// The request did not finish in time.
    #[error("Optimizer request timed out")]
    Timeout,

    /// The body was not the expected envelope.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The optimizer reported a failure in its envelope.
    #[error("Optimizer rejected request: {0}")]
    Rejected(String),

    /// No optimizer exists for the node's stage.
    #[error("No optimizer for stage {0}")]
    UnsupportedStage(Stage),
}

/// A per-stage attribute optimizer.
#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Enrich one node's attributes. Returns the attribute set to merge.
    async fn optimize(
        &self,
        stage: Stage,
        attributes: &Value,
    ) -> Result<Map<String, Value>, OptimizerError>;
}

/// Read the `{status, data}` envelope.
pub fn unwrap_envelope(body: Value) -> Result<Map<String, Value>, OptimizerError> {
    let Value::Object(mut envelope) = body else {
        return Err(OptimizerError::ParseError("expected a JSON object".to_string()));
    };
    let status = envelope
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if status != "success" {
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| format!("status '{}'", status), str::to_string);
        return Err(OptimizerError::Rejected(message));
    }
    match envelope.remove("data") {
        Some(Value::Object(data)) => Ok(data),
        _ => Err(OptimizerError::ParseError(
            "missing 'data' object".to_string(),
        )),
    }
}

/// HTTP client for the optimizer service.
#[derive(Clone)]
pub struct HttpOptimizer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOptimizer")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl HttpOptimizer {
    /// Build a client from configuration.
    pub fn new(config: &OptimizerConfig) -> Result<Self, OptimizerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| OptimizerError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Build a request with optional Bearer auth.
    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.post(&url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Check the status code and parse the envelope.
    async fn handle_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<Map<String, Value>, OptimizerError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(OptimizerError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OptimizerError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OptimizerError::ServerError(status.as_u16(), body));
        }
        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| OptimizerError::ParseError(e.to_string()))?;
        unwrap_envelope(body)
    }
}

#[async_trait]
impl Optimizer for HttpOptimizer {
    async fn optimize(
        &self,
        stage: Stage,
        attributes: &Value,
    ) -> Result<Map<String, Value>, OptimizerError> {
        if !Stage::CANONICAL.contains(&stage) {
            return Err(OptimizerError::UnsupportedStage(stage));
        }
        let path = format!("/ai/optimize/{}", stage.key());
        tracing::debug!("POST {}{}", self.base_url, path);

        let resp = self
            .request(&path)
            .json(attributes)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OptimizerError::Timeout
                } else {
                    OptimizerError::ConnectionFailed(format!("{}: {e}", self.base_url))
                }
            })?;
        self.handle_response(resp).await
    }
}
