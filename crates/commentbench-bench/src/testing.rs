//! Fixtures shared by the bench tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use commentbench_client::{Analysis, ClientError, PredictionClient};
use commentbench_core::{FieldValue, GroundTruthRecord, Labels, Prediction};
use commentbench_store::{GroundTruthTable, NewRun};

/// Three records: `1` and `3` prioritized, `2` not.
pub fn sample_table() -> GroundTruthTable {
    let record = |id: &str, prioritized: bool, short_notice: bool| GroundTruthRecord {
        id: id.into(),
        comment_text: format!("comment {id}"),
        truth: Labels {
            patient_prioritized: FieldValue::Bool(prioritized),
            patient_short_notice: FieldValue::Bool(short_notice),
            ..Labels::default()
        },
    };
    GroundTruthTable::new(vec![
        record("1", true, true),
        record("2", false, false),
        record("3", true, false),
    ])
    .unwrap()
}

pub fn prediction(prioritized: Option<bool>) -> Prediction {
    Prediction {
        labels: Labels {
            patient_prioritized: prioritized.into(),
            ..Labels::default()
        },
        reasoning: None,
    }
}

pub fn new_run(prediction: Prediction) -> NewRun {
    NewRun {
        prediction,
        latency_ms: Some(100.0),
        start_time: Utc::now(),
        end_time: None,
        status_code: Some(200),
    }
}

/// Replays scripted outcomes in call order; once the script runs out every
/// call returns `fallback`.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<Prediction, ClientError>>>,
    fallback: Prediction,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(script: Vec<Result<Prediction, ClientError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: prediction(Some(true)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(prediction: Prediction) -> Self {
        Self {
            fallback: prediction,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn transport_error() -> ClientError {
    ClientError::Server {
        status: 503,
        body: "unavailable".into(),
    }
}

#[async_trait]
impl PredictionClient for ScriptedClient {
    async fn analyze(&self, _comment_text: &str) -> Result<Analysis, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let prediction = match next {
            Some(outcome) => outcome?,
            None => self.fallback.clone(),
        };
        tokio::task::yield_now().await;
        Ok(Analysis {
            prediction,
            latency_ms: Some(120.0),
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            status_code: Some(200),
        })
    }
}
