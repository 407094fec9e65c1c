use super::criteria::Weights;
use super::error::ClassificationError;
use super::matrix::{build_course_matrix, DecisionMatrix, MaterialInput};
use super::model::{MaterialClassificationRef, MaterialSummary, TestCaseMetrics};
use super::scorer::{Scorer, Scoring};
use crate::db::models::ClassificationResult;
use crate::db::types::CognitiveLevel;

/// Course-level inputs drawn from a student's latest material results.
#[derive(Debug, Clone)]
pub(crate) struct CourseInputs {
    pub(crate) inputs: Vec<MaterialInput>,
    pub(crate) materials: Vec<MaterialClassificationRef>,
    pub(crate) test_case_metrics: TestCaseMetrics,
}

#[derive(Debug, Clone)]
pub(crate) struct Aggregate {
    pub(crate) matrix: DecisionMatrix,
    pub(crate) scoring: Scoring,
    pub(crate) score: f64,
    pub(crate) level: CognitiveLevel,
}

pub(crate) fn course_inputs(
    material_results: &[ClassificationResult],
) -> Result<CourseInputs, ClassificationError> {
    if material_results.is_empty() {
        return Err(ClassificationError::InsufficientData(
            "no material-level classification for this student and course".to_string(),
        ));
    }

    let mut inputs = Vec::with_capacity(material_results.len());
    let mut materials = Vec::with_capacity(material_results.len());
    let mut test_case_metrics = TestCaseMetrics::default();

    for result in material_results {
        // Without a summary the material's own score stands in for its
        // completion criteria, so the course level tracks the material level.
        let (test_case_completion_rate, completion_ratio) = match material_summary(result) {
            Some(summary) => {
                test_case_metrics.completed += summary.completed_count;
                test_case_metrics.total += summary.question_count;
                (summary.average_test_case_completion, summary.completion_ratio())
            }
            None => {
                let proxy = result.classification_score.clamp(0.0, 1.0);
                (proxy, proxy)
            }
        };

        inputs.push(MaterialInput {
            material_id: result.scope_id().to_string(),
            score: result.classification_score,
            test_case_completion_rate,
            completion_ratio,
        });
        materials.push(MaterialClassificationRef {
            result_id: result.id.clone(),
            material_id: result.scope_id().to_string(),
            level: result.classification_level,
            score: result.classification_score,
        });
    }

    Ok(CourseInputs { inputs, materials, test_case_metrics })
}

/// Re-scores the materials one level up and classifies the mean closeness.
pub(crate) fn aggregate(
    inputs: &[MaterialInput],
    scorer: &dyn Scorer,
    weights: &Weights,
) -> Result<Aggregate, ClassificationError> {
    let matrix = build_course_matrix(inputs)?;
    let scoring = scorer.score(&matrix, weights)?;
    let score = mean(&scoring.closeness);
    Ok(Aggregate { matrix, scoring, score, level: CognitiveLevel::from_score(score) })
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().sum::<f64>() / values.len() as f64).clamp(0.0, 1.0)
}

fn material_summary(result: &ClassificationResult) -> Option<MaterialSummary> {
    let summary = result
        .raw_data
        .0
        .get("summary")
        .cloned()
        .map(serde_json::from_value::<MaterialSummary>);
    match summary {
        Some(Ok(summary)) => Some(summary),
        other => {
            tracing::warn!(
                result_id = %result.id,
                malformed = matches!(other, Some(Err(_))),
                "Material result carries no usable summary; using its score for completion criteria"
            );
            None
        }
    }
}
