use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) const COMPILE_COUNT: &str = "compile_count";
pub(crate) const CODING_TIME: &str = "coding_time";
pub(crate) const TRIAL_STATUS: &str = "trial_status";
pub(crate) const COMPLETION_STATUS: &str = "completion_status";
pub(crate) const VARIABLE_COUNT: &str = "variable_count";
pub(crate) const FUNCTION_COUNT: &str = "function_count";
pub(crate) const TEST_CASE_COMPLETION_RATE: &str = "test_case_completion_rate";
pub(crate) const MATERIAL_SCORE: &str = "material_score";
pub(crate) const COMPLETION_RATIO: &str = "completion_ratio";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Polarity {
    /// Higher raw values are better.
    Benefit,
    /// Lower raw values are better.
    Cost,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Criterion {
    pub(crate) name: &'static str,
    pub(crate) polarity: Polarity,
    pub(crate) default_weight: f64,
}

const fn criterion(name: &'static str, polarity: Polarity, default_weight: f64) -> Criterion {
    Criterion { name, polarity, default_weight }
}

/// Columns of a material-level matrix, one row per question.
pub(crate) const MATERIAL_CRITERIA: [Criterion; 7] = [
    criterion(COMPILE_COUNT, Polarity::Cost, 0.15),
    criterion(CODING_TIME, Polarity::Cost, 0.15),
    criterion(TRIAL_STATUS, Polarity::Cost, 0.10),
    criterion(COMPLETION_STATUS, Polarity::Benefit, 0.20),
    criterion(VARIABLE_COUNT, Polarity::Benefit, 0.10),
    criterion(FUNCTION_COUNT, Polarity::Benefit, 0.10),
    criterion(TEST_CASE_COMPLETION_RATE, Polarity::Benefit, 0.20),
];

/// Columns of a course-level matrix, one row per material.
pub(crate) const COURSE_CRITERIA: [Criterion; 3] = [
    criterion(MATERIAL_SCORE, Polarity::Benefit, 0.60),
    criterion(TEST_CASE_COMPLETION_RATE, Polarity::Benefit, 0.25),
    criterion(COMPLETION_RATIO, Polarity::Benefit, 0.15),
];

/// Serialisable description of one matrix column, as it appears in traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CriterionColumn {
    pub(crate) name: String,
    pub(crate) polarity: Polarity,
}

impl From<&Criterion> for CriterionColumn {
    fn from(criterion: &Criterion) -> Self {
        Self { name: criterion.name.to_string(), polarity: criterion.polarity }
    }
}

pub(crate) fn columns(criteria: &[Criterion]) -> Vec<CriterionColumn> {
    criteria.iter().map(CriterionColumn::from).collect()
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum WeightsError {
    #[error("unknown criterion '{0}'")]
    UnknownCriterion(String),
    #[error("weight for '{name}' must be finite and non-negative, got {value}")]
    InvalidWeight { name: String, value: f64 },
    #[error("at least one criterion weight must be positive")]
    AllZero,
}

/// Criterion weights, aligned index-for-index with a criterion list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct Weights(Vec<f64>);

impl Weights {
    pub(crate) fn defaults(criteria: &[Criterion]) -> Self {
        Self(criteria.iter().map(|criterion| criterion.default_weight).collect())
    }

    pub(crate) fn with_overrides(
        criteria: &[Criterion],
        overrides: &[(String, f64)],
    ) -> Result<Self, WeightsError> {
        let mut weights = Self::defaults(criteria).0;

        for (name, value) in overrides {
            let index = criteria
                .iter()
                .position(|criterion| criterion.name == name.as_str())
                .ok_or_else(|| WeightsError::UnknownCriterion(name.clone()))?;
            if !value.is_finite() || *value < 0.0 {
                return Err(WeightsError::InvalidWeight { name: name.clone(), value: *value });
            }
            weights[index] = *value;
        }

        if weights.iter().all(|weight| *weight == 0.0) {
            return Err(WeightsError::AllZero);
        }

        Ok(Self(weights))
    }

    pub(crate) fn as_slice(&self) -> &[f64] {
        &self.0
    }

}
