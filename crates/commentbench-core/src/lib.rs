pub mod accuracy;
pub mod aggregate;
pub mod latency;
pub mod model;
pub mod normalize;

pub use accuracy::{AccuracySummary, FailureRow, FieldAccuracy, accuracy_summary, failure_rows};
pub use aggregate::{
    DeterminismSummary, FieldAgreement, FieldRollup, RecordStats, SummaryFold, ValueCount,
    record_stats, summarize,
};
pub use latency::LatencyStats;
pub use model::{
    Availability, DateRange, FieldValue, GroundTruthRecord, Labels, Prediction, RecordId, Run,
    TrackedField,
};
pub use normalize::Symbol;
