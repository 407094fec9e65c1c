use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::criteria::Weights;
use super::error::ClassificationError;
use super::matrix::DecisionMatrix;
use super::topsis::{TopsisScorer, TopsisTrace};
use crate::db::types::ClassificationMethod;

/// Method names the product knows about but that have no scorer yet.
const RECOGNISED_METHODS: &[&str] = &["fuzzy", "neural", "cognitive_levels"];

/// Output of one scoring pass.
#[derive(Debug, Clone)]
pub(crate) struct Scoring {
    /// Closeness per unit row, in matrix order. Anchor rows are excluded.
    pub(crate) closeness: Vec<f64>,
    /// Mean weighted distance of the unit rows from the ideal value, per
    /// criterion.
    pub(crate) criterion_gaps: Vec<f64>,
    pub(crate) trace: Option<ScoringTrace>,
}

/// Audit log of a scoring pass. Nothing downstream computes from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub(crate) enum ScoringTrace {
    Topsis(TopsisTrace),
}

/// A multi-criteria scoring method over a decision matrix.
pub(crate) trait Scorer: Send + Sync {
    fn method(&self) -> ClassificationMethod;

    fn score(
        &self,
        matrix: &DecisionMatrix,
        weights: &Weights,
    ) -> Result<Scoring, ClassificationError>;
}

/// Scorers keyed by method.
#[derive(Clone)]
pub(crate) struct ScorerRegistry {
    scorers: Vec<Arc<dyn Scorer>>,
}

impl ScorerRegistry {
    pub(crate) fn new(scorers: Vec<Arc<dyn Scorer>>) -> Self {
        Self { scorers }
    }

    pub(crate) fn get(&self, method: ClassificationMethod) -> Result<&dyn Scorer, ClassificationError> {
        self.scorers
            .iter()
            .find(|scorer| scorer.method() == method)
            .map(|scorer| scorer.as_ref())
            .ok_or_else(|| ClassificationError::UnsupportedMethod(method.as_str().to_string()))
    }
}

impl Default for ScorerRegistry {
    fn default() -> Self {
        Self::new(vec![Arc::new(TopsisScorer::new().with_trace(true))])
    }
}

/// Resolves a `classification_type` parameter; absent means TOPSIS.
pub(crate) fn resolve_method(raw: Option<&str>) -> Result<ClassificationMethod, ClassificationError> {
    let name = raw.map(|value| value.trim().to_ascii_lowercase()).unwrap_or_default();
    match name.as_str() {
        "" | "topsis" => Ok(ClassificationMethod::Topsis),
        other if RECOGNISED_METHODS.contains(&other) => {
            Err(ClassificationError::UnsupportedMethod(other.to_string()))
        }
        other => Err(ClassificationError::UnsupportedMethod(format!("{other} (unknown)"))),
    }
}
