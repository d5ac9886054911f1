use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// How an invocation failed, for counting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unreachable, timed out, or non-2xx.
    Transport,
    /// Reachable, but the body is not a prediction.
    Malformed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Malformed => "malformed",
        }
    }
}

impl ClientError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http(e) if e.is_decode() => FailureKind::Malformed,
            Self::Http(_) | Self::Server { .. } => FailureKind::Transport,
            Self::Malformed(_) => FailureKind::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transport_failures() {
        let err = ClientError::Server {
            status: 503,
            body: "unavailable".into(),
        };
        assert_eq!(err.kind(), FailureKind::Transport);
        assert_eq!(err.to_string(), "server returned 503: unavailable");
    }

    #[test]
    fn malformed_kind_label() {
        let err = ClientError::Malformed("not json".into());
        assert_eq!(err.kind().as_str(), "malformed");
        assert_eq!(
            serde_json::to_value(err.kind()).unwrap(),
            serde_json::json!("malformed")
        );
    }
}
