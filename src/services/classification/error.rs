use thiserror::Error;

use super::matrix::DroppedRow;
use crate::repositories::metric_source::MetricSourceError;
use crate::repositories::store::StoreError;

#[derive(Debug, Error)]
pub(crate) enum ClassificationError {
    #[error("nothing to classify: {0}")]
    InsufficientData(String),
    #[error("every metric row was rejected ({} dropped)", .dropped.len())]
    InvalidMetric { dropped: Vec<DroppedRow> },
    #[error("concurrent write conflict on {0}")]
    ConcurrentWriteConflict(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("unsupported classification method '{0}'")]
    UnsupportedMethod(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("weight vector has {actual} entries but the matrix has {expected} criteria")]
    WeightMismatch { expected: usize, actual: usize },
    #[error("malformed decision matrix: {0}")]
    MalformedMatrix(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ClassificationError {
    /// Only upstream outages are worth retrying; everything else is
    /// deterministic for the same inputs.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, ClassificationError::UpstreamUnavailable(_))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ClassificationError::InsufficientData(_) => "insufficient_data",
            ClassificationError::InvalidMetric { .. } => "invalid_metric",
            ClassificationError::ConcurrentWriteConflict(_) => "conflict",
            ClassificationError::UpstreamUnavailable(_) => "upstream_unavailable",
            ClassificationError::UnsupportedMethod(_) => "unsupported_method",
            ClassificationError::NotFound(_) => "not_found",
            ClassificationError::WeightMismatch { .. } => "weight_mismatch",
            ClassificationError::MalformedMatrix(_) => "malformed_matrix",
            ClassificationError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for ClassificationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(key) => ClassificationError::ConcurrentWriteConflict(key),
            StoreError::Unavailable(reason) => {
                ClassificationError::UpstreamUnavailable(format!("result store: {reason}"))
            }
            StoreError::Database(err) => ClassificationError::Storage(err.to_string()),
            StoreError::Encoding(err) => ClassificationError::Storage(err.to_string()),
        }
    }
}

impl From<MetricSourceError> for ClassificationError {
    fn from(err: MetricSourceError) -> Self {
        match err {
            MetricSourceError::Unavailable(reason) => {
                ClassificationError::UpstreamUnavailable(format!("metric source: {reason}"))
            }
            MetricSourceError::Database(err) => ClassificationError::Storage(err.to_string()),
        }
    }
}
