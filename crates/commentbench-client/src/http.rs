//! HTTP client for the comment-analysis endpoint.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use commentbench_core::{Prediction, TrackedField};
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{Analysis, ClientError, PredictionClient};

/// Connection settings for [`HttpPredictionClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    /// Sent verbatim as the `Cookie` header.
    pub cookie: Option<String>,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            cookie: None,
            timeout: Duration::from_secs(30),
            verify_tls: true,
        }
    }
}

/// Pick the cookie: an explicit value wins, then the contents of `file`.
///
/// A missing or blank file yields `None`.
pub fn resolve_cookie(explicit: Option<&str>, file: Option<&Path>) -> std::io::Result<Option<String>> {
    if let Some(cookie) = explicit.map(str::trim).filter(|c| !c.is_empty()) {
        return Ok(Some(cookie.to_string()));
    }
    let Some(path) = file else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let contents = contents.trim();
    Ok((!contents.is_empty()).then(|| contents.to_string()))
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    comment_text: &'a str,
}

/// reqwest-backed [`PredictionClient`].
pub struct HttpPredictionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPredictionClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(cookie) = &config.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| ClientError::Malformed(format!("cookie is not a valid header: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        info!(
            endpoint = %config.endpoint,
            timeout_secs = config.timeout.as_secs(),
            verify_tls = config.verify_tls,
            cookie = config.cookie.is_some(),
            "prediction client ready"
        );
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn analyze(&self, comment_text: &str) -> Result<Analysis, ClientError> {
        let start_time = Utc::now();
        let started = Instant::now();

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeRequest { comment_text })
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        let end_time = Utc::now();

        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let prediction = parse_prediction(&body)?;
        debug!(status = status.as_u16(), latency_ms = elapsed, "analysis received");
        Ok(Analysis {
            prediction,
            latency_ms: elapsed.is_finite().then_some(elapsed),
            start_time,
            end_time: Some(end_time),
            status_code: Some(status.as_u16()),
        })
    }
}

/// Read a prediction from a response body.
///
/// The endpoint nests the English analysis under `"en"`; older deployments
/// return it at the top level.
pub fn parse_prediction(body: &str) -> Result<Prediction, ClientError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ClientError::Malformed(format!("body is not JSON: {e}")))?;
    let payload = match value.get("en") {
        Some(en @ Value::Object(_)) => en,
        _ => &value,
    };
    let Value::Object(fields) = payload else {
        return Err(ClientError::Malformed(format!("expected an object, got {payload}")));
    };

    let tracked = TrackedField::ALL
        .iter()
        .any(|f| fields.contains_key(prediction_key(*f)));
    if !tracked {
        let detail = fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no prediction fields");
        return Err(ClientError::Malformed(detail.to_string()));
    }

    serde_json::from_value(payload.clone())
        .map_err(|e| ClientError::Malformed(format!("invalid prediction: {e}")))
}

fn prediction_key(field: TrackedField) -> &'static str {
    match field {
        TrackedField::Availability => "availability_periods",
        other => other.as_str(),
    }
}
