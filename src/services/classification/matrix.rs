//! Decision matrix construction for both classification levels.
//!
//! Material matrices have one row per question summary, course matrices one
//! row per material. Every matrix gets two reference rows appended after
//! its unit rows: an ideal anchor and an anti-ideal anchor. They give the
//! scorer an absolute scale, so a single question (or a course of equally
//! strong materials) is not collapsed onto both ideal points.

use serde::{Deserialize, Serialize};

use super::criteria::{columns, CriterionColumn, COURSE_CRITERIA, MATERIAL_CRITERIA};
use super::error::ClassificationError;
use crate::repositories::metric_source::MetricRecord;

pub(crate) const IDEAL_ANCHOR: &str = "anchor:ideal";
pub(crate) const ANTI_IDEAL_ANCHOR: &str = "anchor:anti_ideal";

/// Reference values for the unbounded material criteria. Observed values
/// beyond a bound widen the anchor to the observed extreme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AnchorBounds {
    pub(crate) compile_count_ceiling: f64,
    pub(crate) coding_time_ceiling: f64,
    pub(crate) variable_count_target: f64,
    pub(crate) function_count_target: f64,
}

impl Default for AnchorBounds {
    fn default() -> Self {
        Self {
            compile_count_ceiling: 20.0,
            coding_time_ceiling: 3600.0,
            variable_count_target: 10.0,
            function_count_target: 5.0,
        }
    }
}

/// A metric record the builder refused, with its position in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DroppedRow {
    pub(crate) position: usize,
    pub(crate) question_id: String,
    pub(crate) reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DecisionMatrix {
    columns: Vec<CriterionColumn>,
    row_labels: Vec<String>,
    rows: Vec<Vec<f64>>,
    unit_count: usize,
}

impl DecisionMatrix {
    pub(crate) fn new(
        columns: Vec<CriterionColumn>,
        row_labels: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, ClassificationError> {
        if rows.is_empty() {
            return Err(ClassificationError::InsufficientData(
                "decision matrix has no rows".to_string(),
            ));
        }
        if columns.is_empty() {
            return Err(ClassificationError::MalformedMatrix("no criteria".to_string()));
        }
        if row_labels.len() != rows.len() {
            return Err(ClassificationError::MalformedMatrix(format!(
                "{} labels for {} rows",
                row_labels.len(),
                rows.len()
            )));
        }
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ClassificationError::MalformedMatrix(format!(
                    "row {index} has {} values, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            if row.iter().any(|value| !value.is_finite()) {
                return Err(ClassificationError::MalformedMatrix(format!(
                    "row {index} holds a non-finite value"
                )));
            }
        }

        let unit_count = rows.len();
        Ok(Self { columns, row_labels, rows, unit_count })
    }

    /// Appends the reference rows. They take part in normalisation and
    /// ideal selection but are never reported as units.
    pub(crate) fn with_anchors(mut self, ideal: Vec<f64>, anti_ideal: Vec<f64>) -> Self {
        debug_assert_eq!(ideal.len(), self.columns.len());
        debug_assert_eq!(anti_ideal.len(), self.columns.len());
        self.rows.push(ideal);
        self.row_labels.push(IDEAL_ANCHOR.to_string());
        self.rows.push(anti_ideal);
        self.row_labels.push(ANTI_IDEAL_ANCHOR.to_string());
        self
    }

    pub(crate) fn columns(&self) -> &[CriterionColumn] {
        &self.columns
    }

    pub(crate) fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub(crate) fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub(crate) fn unit_labels(&self) -> &[String] {
        &self.row_labels[..self.unit_count]
    }

    pub(crate) fn unit_count(&self) -> usize {
        self.unit_count
    }
}

/// One question's attempts folded into a single row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionSummary {
    pub(crate) question_id: String,
    pub(crate) compile_count: f64,
    pub(crate) coding_time: f64,
    pub(crate) trial_status: f64,
    pub(crate) completion_status: f64,
    pub(crate) variable_count: f64,
    pub(crate) function_count: f64,
    pub(crate) test_case_completion_rate: f64,
}

impl QuestionSummary {
    fn from_record(record: &MetricRecord) -> Result<Self, String> {
        Ok(Self {
            question_id: record.question_id.clone(),
            compile_count: non_negative("compile_count", record.compile_count)?,
            coding_time: non_negative("coding_time", record.coding_time)?,
            trial_status: unit_interval("trial_status", record.trial_status)?,
            completion_status: unit_interval("completion_status", record.completion_status)?,
            variable_count: non_negative("variable_count", record.variable_count)?,
            function_count: non_negative("function_count", record.function_count)?,
            test_case_completion_rate: unit_interval(
                "test_case_completion_rate",
                record.test_case_completion_rate,
            )?,
        })
    }

    /// Folds a further attempt in. Sums that overflow leave `self` untouched.
    fn absorb(&mut self, attempt: &QuestionSummary) -> Result<(), String> {
        let compile_count = self.compile_count + attempt.compile_count;
        if !compile_count.is_finite() {
            return Err("compile_count overflowed across attempts".to_string());
        }
        let coding_time = self.coding_time + attempt.coding_time;
        if !coding_time.is_finite() {
            return Err("coding_time overflowed across attempts".to_string());
        }

        self.compile_count = compile_count;
        self.coding_time = coding_time;
        self.trial_status = self.trial_status.min(attempt.trial_status);
        self.completion_status = self.completion_status.max(attempt.completion_status);
        self.variable_count = self.variable_count.max(attempt.variable_count);
        self.function_count = self.function_count.max(attempt.function_count);
        self.test_case_completion_rate =
            self.test_case_completion_rate.max(attempt.test_case_completion_rate);
        Ok(())
    }

    /// Values in `MATERIAL_CRITERIA` order.
    fn values(&self) -> Vec<f64> {
        vec![
            self.compile_count,
            self.coding_time,
            self.trial_status,
            self.completion_status,
            self.variable_count,
            self.function_count,
            self.test_case_completion_rate,
        ]
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completion_status >= 1.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MaterialMatrix {
    pub(crate) matrix: DecisionMatrix,
    pub(crate) questions: Vec<QuestionSummary>,
    pub(crate) dropped: Vec<DroppedRow>,
}

pub(crate) fn build_material_matrix(
    records: &[MetricRecord],
    bounds: &AnchorBounds,
) -> Result<MaterialMatrix, ClassificationError> {
    if records.is_empty() {
        return Err(ClassificationError::InsufficientData("no metric records".to_string()));
    }

    let mut questions: Vec<QuestionSummary> = Vec::new();
    let mut overflowed: Vec<String> = Vec::new();
    let mut dropped = Vec::new();

    for (position, record) in records.iter().enumerate() {
        let attempt = match QuestionSummary::from_record(record) {
            Ok(attempt) => attempt,
            Err(reason) => {
                drop_row(&mut dropped, position, &record.question_id, reason);
                continue;
            }
        };

        if overflowed.contains(&attempt.question_id) {
            let reason = "earlier attempts of this question overflowed".to_string();
            drop_row(&mut dropped, position, &attempt.question_id, reason);
            continue;
        }

        match questions.iter().position(|q| q.question_id == attempt.question_id) {
            Some(index) => {
                if let Err(reason) = questions[index].absorb(&attempt) {
                    questions.remove(index);
                    overflowed.push(attempt.question_id.clone());
                    drop_row(&mut dropped, position, &attempt.question_id, reason);
                }
            }
            None => questions.push(attempt),
        }
    }

    if questions.is_empty() {
        return Err(ClassificationError::InvalidMetric { dropped });
    }

    let labels = questions.iter().map(|q| q.question_id.clone()).collect();
    let rows = questions.iter().map(QuestionSummary::values).collect();
    let matrix = DecisionMatrix::new(columns(&MATERIAL_CRITERIA), labels, rows)?;

    let observed_max = |pick: fn(&QuestionSummary) -> f64| {
        questions.iter().map(pick).fold(0.0_f64, f64::max)
    };
    let ideal = vec![
        0.0,
        0.0,
        0.0,
        1.0,
        bounds.variable_count_target.max(observed_max(|q| q.variable_count)),
        bounds.function_count_target.max(observed_max(|q| q.function_count)),
        1.0,
    ];
    let anti_ideal = vec![
        bounds.compile_count_ceiling.max(observed_max(|q| q.compile_count)),
        bounds.coding_time_ceiling.max(observed_max(|q| q.coding_time)),
        1.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ];

    Ok(MaterialMatrix { matrix: matrix.with_anchors(ideal, anti_ideal), questions, dropped })
}

fn drop_row(dropped: &mut Vec<DroppedRow>, position: usize, question_id: &str, reason: String) {
    tracing::warn!(
        question_id = %question_id,
        position,
        reason = %reason,
        "Dropping invalid metric row"
    );
    dropped.push(DroppedRow { position, question_id: question_id.to_string(), reason });
}

/// Course-level row inputs taken from one material's latest result.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MaterialInput {
    pub(crate) material_id: String,
    pub(crate) score: f64,
    pub(crate) test_case_completion_rate: f64,
    pub(crate) completion_ratio: f64,
}

pub(crate) fn build_course_matrix(
    inputs: &[MaterialInput],
) -> Result<DecisionMatrix, ClassificationError> {
    if inputs.is_empty() {
        return Err(ClassificationError::InsufficientData(
            "no material classifications".to_string(),
        ));
    }

    let labels = inputs.iter().map(|input| input.material_id.clone()).collect();
    let rows = inputs
        .iter()
        .map(|input| {
            vec![
                clamp_unit(input.score),
                clamp_unit(input.test_case_completion_rate),
                clamp_unit(input.completion_ratio),
            ]
        })
        .collect();

    let width = COURSE_CRITERIA.len();
    Ok(DecisionMatrix::new(columns(&COURSE_CRITERIA), labels, rows)?
        .with_anchors(vec![1.0; width], vec![0.0; width]))
}

/// Missing and NaN values read as 0; infinities cannot be coerced.
fn coerce(field: &str, value: Option<f64>) -> Result<f64, String> {
    match value {
        None => Ok(0.0),
        Some(value) if value.is_nan() => Ok(0.0),
        Some(value) if value.is_infinite() => Err(format!("{field} is not finite")),
        Some(value) => Ok(value),
    }
}

fn non_negative(field: &str, value: Option<f64>) -> Result<f64, String> {
    let value = coerce(field, value)?;
    if value < 0.0 {
        return Err(format!("{field} must be non-negative, got {value}"));
    }
    Ok(value)
}

fn unit_interval(field: &str, value: Option<f64>) -> Result<f64, String> {
    let value = coerce(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{field} must lie in [0, 1], got {value}"));
    }
    Ok(value)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
