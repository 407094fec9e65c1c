use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{ClassificationMethod, ClassificationScope, CognitiveLevel};

/// One immutable classification fact. Later runs add new rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ClassificationResult {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) course_id: String,
    pub(crate) learning_material_id: Option<String>,
    pub(crate) scope: ClassificationScope,
    pub(crate) classification_type: ClassificationMethod,
    pub(crate) classification_level: CognitiveLevel,
    pub(crate) classification_score: f64,
    pub(crate) raw_data: Json<serde_json::Value>,
    pub(crate) classified_at: PrimitiveDateTime,
}

impl ClassificationResult {
    /// Identifier of the classified unit: the material for material scope,
    /// the course otherwise.
    pub(crate) fn scope_id(&self) -> &str {
        match self.scope {
            ClassificationScope::Material => {
                self.learning_material_id.as_deref().unwrap_or(&self.course_id)
            }
            ClassificationScope::Course => &self.course_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ClassificationHistoryEntry {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) course_id: String,
    pub(crate) classification_result_id: String,
    pub(crate) classification_type: ClassificationMethod,
    pub(crate) classification_level: CognitiveLevel,
    pub(crate) classification_score: f64,
    pub(crate) raw_data: Json<serde_json::Value>,
    pub(crate) classified_at: PrimitiveDateTime,
}

impl ClassificationHistoryEntry {
    pub(crate) fn from_result(id: String, result: &ClassificationResult) -> Self {
        Self {
            id,
            user_id: result.user_id.clone(),
            course_id: result.course_id.clone(),
            classification_result_id: result.id.clone(),
            classification_type: result.classification_type,
            classification_level: result.classification_level,
            classification_score: result.classification_score,
            raw_data: result.raw_data.clone(),
            classified_at: result.classified_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct LearningMaterial {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) title: String,
}
