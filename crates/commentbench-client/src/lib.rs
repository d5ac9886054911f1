//! Client for the external comment-analysis endpoint.
//!
//! The benchmark only needs one operation: send a comment, get back a
//! prediction and how long it took. [`PredictionClient`] is that seam;
//! [`HttpPredictionClient`] is the production implementation.

mod error;
pub mod http;

pub use error::{ClientError, FailureKind};
pub use http::{ClientConfig, HttpPredictionClient, resolve_cookie};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use commentbench_core::Prediction;

/// One successful call to the analysis endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub prediction: Prediction,
    pub latency_ms: Option<f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status_code: Option<u16>,
}

/// Something that can analyze a comment.
#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn analyze(&self, comment_text: &str) -> Result<Analysis, ClientError>;
}
