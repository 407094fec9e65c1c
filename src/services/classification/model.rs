//! Shapes stored in `raw_data`. Consumers render these directly.

use serde::{Deserialize, Serialize};

use super::criteria::CriterionColumn;
use super::matrix::{DroppedRow, QuestionSummary};
use super::scorer::ScoringTrace;
use crate::db::types::{ClassificationMethod, CognitiveLevel};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub(crate) struct MaterialSummary {
    pub(crate) question_count: usize,
    pub(crate) completed_count: usize,
    pub(crate) average_test_case_completion: f64,
}

impl MaterialSummary {
    pub(crate) fn from_questions(questions: &[QuestionSummary]) -> Self {
        let question_count = questions.len();
        let completed_count = questions.iter().filter(|q| q.is_completed()).count();
        let average_test_case_completion = if question_count == 0 {
            0.0
        } else {
            questions.iter().map(|q| q.test_case_completion_rate).sum::<f64>()
                / question_count as f64
        };
        Self { question_count, completed_count, average_test_case_completion }
    }

    pub(crate) fn completion_ratio(&self) -> f64 {
        if self.question_count == 0 {
            0.0
        } else {
            self.completed_count as f64 / self.question_count as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MaterialRawData {
    pub(crate) method: ClassificationMethod,
    pub(crate) material_id: String,
    pub(crate) summary: MaterialSummary,
    pub(crate) criteria: Vec<CriterionColumn>,
    pub(crate) weights: Vec<f64>,
    pub(crate) dropped_rows: Vec<DroppedRow>,
    pub(crate) unit_ids: Vec<String>,
    pub(crate) unit_scores: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) trace: Option<ScoringTrace>,
    pub(crate) weak_areas: Vec<String>,
    pub(crate) recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MaterialClassificationRef {
    pub(crate) result_id: String,
    pub(crate) material_id: String,
    pub(crate) level: CognitiveLevel,
    pub(crate) score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub(crate) struct TestCaseMetrics {
    pub(crate) completed: usize,
    pub(crate) total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CalculationDetails {
    pub(crate) material_count: usize,
    pub(crate) average_score: f64,
    pub(crate) test_case_metrics: TestCaseMetrics,
    pub(crate) criteria: Vec<CriterionColumn>,
    pub(crate) weights: Vec<f64>,
    pub(crate) unit_ids: Vec<String>,
    pub(crate) unit_scores: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CourseRawData {
    pub(crate) method: ClassificationMethod,
    pub(crate) material_classifications: Vec<MaterialClassificationRef>,
    pub(crate) calculation_details: CalculationDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) trace: Option<ScoringTrace>,
    pub(crate) weak_areas: Vec<String>,
    pub(crate) recommendations: Vec<String>,
}
