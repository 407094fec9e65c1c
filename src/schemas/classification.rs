use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{ClassificationHistoryEntry, ClassificationResult};
use crate::db::types::{ClassificationMethod, ClassificationScope, CognitiveLevel};
use crate::services::classification::recorder::Trend;
use crate::services::classification::{CourseReport, HistoryView};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MethodQuery {
    #[serde(default)]
    pub(crate) classification_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct LatestQuery {
    pub(crate) scope: ClassificationScope,
    #[validate(length(min = 1, message = "scope_id must not be empty"))]
    pub(crate) scope_id: String,
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub(crate) student_id: String,
    #[serde(default)]
    pub(crate) classification_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct RunRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "course_id must not be empty"))]
    pub(crate) course_id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "material_id must not be empty"))]
    pub(crate) material_id: Option<String>,
    #[serde(default)]
    pub(crate) classification_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassificationResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) course_id: String,
    pub(crate) learning_material_id: Option<String>,
    pub(crate) scope: ClassificationScope,
    pub(crate) classification_type: ClassificationMethod,
    pub(crate) classification_level: CognitiveLevel,
    pub(crate) level_code: &'static str,
    pub(crate) classification_score: f64,
    pub(crate) raw_data: serde_json::Value,
    pub(crate) classified_at: String,
}

impl ClassificationResponse {
    pub(crate) fn from_db(result: ClassificationResult) -> Self {
        Self {
            id: result.id,
            student_id: result.user_id,
            course_id: result.course_id,
            learning_material_id: result.learning_material_id,
            scope: result.scope,
            classification_type: result.classification_type,
            classification_level: result.classification_level,
            level_code: result.classification_level.code(),
            classification_score: result.classification_score,
            raw_data: result.raw_data.0,
            classified_at: format_primitive(result.classified_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryEntryResponse {
    pub(crate) id: String,
    pub(crate) classification_result_id: String,
    pub(crate) classification_type: ClassificationMethod,
    pub(crate) classification_level: CognitiveLevel,
    pub(crate) level_code: &'static str,
    pub(crate) classification_score: f64,
    pub(crate) raw_data: serde_json::Value,
    pub(crate) classified_at: String,
}

impl HistoryEntryResponse {
    fn from_db(entry: ClassificationHistoryEntry) -> Self {
        Self {
            id: entry.id,
            classification_result_id: entry.classification_result_id,
            classification_type: entry.classification_type,
            classification_level: entry.classification_level,
            level_code: entry.classification_level.code(),
            classification_score: entry.classification_score,
            raw_data: entry.raw_data.0,
            classified_at: format_primitive(entry.classified_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryResponse {
    pub(crate) student_id: String,
    pub(crate) course_id: String,
    pub(crate) classification_type: ClassificationMethod,
    pub(crate) entries: Vec<HistoryEntryResponse>,
    pub(crate) trend: Option<Trend>,
}

impl HistoryResponse {
    pub(crate) fn new(
        student_id: String,
        course_id: String,
        method: ClassificationMethod,
        view: HistoryView,
    ) -> Self {
        Self {
            student_id,
            course_id,
            classification_type: method,
            entries: view.entries.into_iter().map(HistoryEntryResponse::from_db).collect(),
            trend: view.trend,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentClassification {
    pub(crate) result_id: String,
    pub(crate) student_id: String,
    pub(crate) level: CognitiveLevel,
    pub(crate) level_code: &'static str,
    pub(crate) score: f64,
    pub(crate) classified_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseReportResponse {
    pub(crate) course_id: String,
    pub(crate) classification_type: ClassificationMethod,
    pub(crate) total_students: usize,
    pub(crate) level_distribution: BTreeMap<CognitiveLevel, usize>,
    pub(crate) average_score: Option<f64>,
    pub(crate) classifications: Vec<StudentClassification>,
}

impl CourseReportResponse {
    pub(crate) fn from_report(report: CourseReport) -> Self {
        Self {
            total_students: report.total_students(),
            course_id: report.course_id,
            classification_type: report.method,
            level_distribution: report.level_distribution,
            average_score: report.average_score,
            classifications: report
                .results
                .into_iter()
                .map(|result| StudentClassification {
                    level_code: result.classification_level.code(),
                    level: result.classification_level,
                    score: result.classification_score,
                    classified_at: format_primitive(result.classified_at),
                    result_id: result.id,
                    student_id: result.user_id,
                })
                .collect(),
        }
    }
}
