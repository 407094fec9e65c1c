use serde::{Deserialize, Serialize};

use super::criteria::{CriterionColumn, Polarity, Weights};
use super::error::ClassificationError;
use super::matrix::DecisionMatrix;
use super::scorer::{Scorer, Scoring, ScoringTrace};
use crate::db::types::ClassificationMethod;

/// Every intermediate step of a TOPSIS pass, rows in matrix order
/// (reference anchors included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TopsisTrace {
    pub(crate) criteria: Vec<CriterionColumn>,
    pub(crate) row_labels: Vec<String>,
    pub(crate) decision_matrix: Vec<Vec<f64>>,
    pub(crate) weights: Vec<f64>,
    /// Largest magnitude per column. Columns are divided by it before
    /// squaring, so the Euclidean norm is `column_scales[j] * column_norms[j]`.
    pub(crate) column_scales: Vec<f64>,
    pub(crate) column_norms: Vec<f64>,
    pub(crate) normalized_matrix: Vec<Vec<f64>>,
    pub(crate) weighted_matrix: Vec<Vec<f64>>,
    pub(crate) ideal_best: Vec<f64>,
    pub(crate) ideal_worst: Vec<f64>,
    pub(crate) separation_best: Vec<f64>,
    pub(crate) separation_worst: Vec<f64>,
    pub(crate) closeness: Vec<f64>,
    /// Criteria whose column norm was zero; they contribute nothing.
    pub(crate) degenerate_columns: Vec<String>,
    /// Rows sitting on both ideal points at once; their closeness is 0.
    pub(crate) degenerate_rows: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TopsisScorer {
    trace: bool,
}

impl TopsisScorer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}

impl Scorer for TopsisScorer {
    fn method(&self) -> ClassificationMethod {
        ClassificationMethod::Topsis
    }

    fn score(
        &self,
        matrix: &DecisionMatrix,
        weights: &Weights,
    ) -> Result<Scoring, ClassificationError> {
        let columns = matrix.columns();
        let rows = matrix.rows();
        let weights = weights.as_slice();
        if weights.len() != columns.len() {
            return Err(ClassificationError::WeightMismatch {
                expected: columns.len(),
                actual: weights.len(),
            });
        }

        let column_scales: Vec<f64> = (0..columns.len())
            .map(|j| rows.iter().fold(0.0_f64, |scale, row| scale.max(row[j].abs())))
            .collect();
        let scaled = |value: f64, scale: f64| if scale == 0.0 { 0.0 } else { value / scale };

        // Row-major accumulation keeps the summation order fixed.
        let mut squares = vec![0.0_f64; columns.len()];
        for row in rows {
            for ((sum, value), scale) in squares.iter_mut().zip(row).zip(&column_scales) {
                let value = scaled(*value, *scale);
                *sum += value * value;
            }
        }
        let column_norms: Vec<f64> = squares.into_iter().map(f64::sqrt).collect();

        let degenerate_columns: Vec<String> = columns
            .iter()
            .zip(&column_norms)
            .filter(|(_, norm)| **norm == 0.0)
            .map(|(column, _)| column.name.clone())
            .collect();
        for column in &degenerate_columns {
            tracing::debug!(column = %column, "Zero-norm criterion column; normalised to 0");
        }

        let normalized_matrix: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(column_scales.iter().zip(&column_norms))
                    .map(|(value, (scale, norm))| {
                        if *norm == 0.0 {
                            0.0
                        } else {
                            scaled(*value, *scale) / norm
                        }
                    })
                    .collect()
            })
            .collect();

        let weighted_matrix: Vec<Vec<f64>> = normalized_matrix
            .iter()
            .map(|row| row.iter().zip(weights).map(|(value, weight)| value * weight).collect())
            .collect();

        let mut ideal_best = Vec::with_capacity(columns.len());
        let mut ideal_worst = Vec::with_capacity(columns.len());
        for (j, column) in columns.iter().enumerate() {
            let (low, high) = weighted_matrix.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(low, high), row| (low.min(row[j]), high.max(row[j])),
            );
            match column.polarity {
                Polarity::Benefit => {
                    ideal_best.push(high);
                    ideal_worst.push(low);
                }
                Polarity::Cost => {
                    ideal_best.push(low);
                    ideal_worst.push(high);
                }
            }
        }

        let separation_best: Vec<f64> =
            weighted_matrix.iter().map(|row| distance(row, &ideal_best)).collect();
        let separation_worst: Vec<f64> =
            weighted_matrix.iter().map(|row| distance(row, &ideal_worst)).collect();

        let mut degenerate_rows = Vec::new();
        let closeness: Vec<f64> = separation_best
            .iter()
            .zip(&separation_worst)
            .enumerate()
            .map(|(i, (best, worst))| {
                let total = best + worst;
                if total == 0.0 {
                    let label = &matrix.row_labels()[i];
                    tracing::warn!(row = %label, "Row coincides with both ideal points; closeness set to 0");
                    degenerate_rows.push(label.clone());
                    0.0
                } else {
                    (worst / total).clamp(0.0, 1.0)
                }
            })
            .collect();

        let units = matrix.unit_count();
        let criterion_gaps = (0..columns.len())
            .map(|j| {
                let total: f64 = weighted_matrix[..units]
                    .iter()
                    .map(|row| (row[j] - ideal_best[j]).abs())
                    .sum();
                total / units as f64
            })
            .collect();

        let unit_closeness = closeness[..units].to_vec();
        let trace = self.trace.then(|| {
            ScoringTrace::Topsis(TopsisTrace {
                criteria: columns.to_vec(),
                row_labels: matrix.row_labels().to_vec(),
                decision_matrix: rows.to_vec(),
                weights: weights.to_vec(),
                column_scales,
                column_norms,
                normalized_matrix,
                weighted_matrix,
                ideal_best,
                ideal_worst,
                separation_best,
                separation_worst,
                closeness,
                degenerate_columns,
                degenerate_rows,
            })
        });

        Ok(Scoring { closeness: unit_closeness, criterion_gaps, trace })
    }
}

fn distance(row: &[f64], target: &[f64]) -> f64 {
    row.iter()
        .zip(target)
        .map(|(value, ideal)| (value - ideal).powi(2))
        .sum::<f64>()
        .sqrt()
}
