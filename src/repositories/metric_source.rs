use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;

use super::is_connectivity_error;

use crate::db::models::LearningMaterial;

/// One (student, question) attempt as recorded by the telemetry producers.
/// `None` means the metric was not measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub(crate) struct MetricRecord {
    pub(crate) question_id: String,
    pub(crate) compile_count: Option<f64>,
    pub(crate) coding_time: Option<f64>,
    pub(crate) trial_status: Option<f64>,
    pub(crate) completion_status: Option<f64>,
    pub(crate) variable_count: Option<f64>,
    pub(crate) function_count: Option<f64>,
    pub(crate) test_case_completion_rate: Option<f64>,
}

pub(crate) const COLUMNS: &str = "\
    question_id, compile_count, coding_time, trial_status, completion_status, \
    variable_count, function_count, test_case_completion_rate";

const MATERIAL_COLUMNS: &str = "id, course_id, title";

#[derive(Debug, Error)]
pub(crate) enum MetricSourceError {
    #[error("metric source unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for MetricSourceError {
    fn from(err: sqlx::Error) -> Self {
        if is_connectivity_error(&err) {
            MetricSourceError::Unavailable(err.to_string())
        } else {
            MetricSourceError::Database(err)
        }
    }
}

/// Read-only view of telemetry and course structure.
#[async_trait]
pub(crate) trait MetricSource: Send + Sync {
    /// Attempts in recording order.
    async fn fetch_metrics(
        &self,
        user_id: &str,
        material_id: &str,
    ) -> Result<Vec<MetricRecord>, MetricSourceError>;

    async fn find_material(
        &self,
        material_id: &str,
    ) -> Result<Option<LearningMaterial>, MetricSourceError>;

    async fn course_materials(
        &self,
        course_id: &str,
    ) -> Result<Vec<LearningMaterial>, MetricSourceError>;

    /// Students enrolled in the course.
    async fn course_students(&self, course_id: &str) -> Result<Vec<String>, MetricSourceError>;

    /// Students with at least one recorded attempt on the material.
    async fn material_students(
        &self,
        material_id: &str,
    ) -> Result<Vec<String>, MetricSourceError>;
}

#[derive(Clone)]
pub(crate) struct PgMetricSource {
    pool: PgPool,
}

impl PgMetricSource {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricSource for PgMetricSource {
    async fn fetch_metrics(
        &self,
        user_id: &str,
        material_id: &str,
    ) -> Result<Vec<MetricRecord>, MetricSourceError> {
        let records = sqlx::query_as::<_, MetricRecord>(&format!(
            "SELECT {COLUMNS}
             FROM question_metrics
             WHERE user_id = $1 AND learning_material_id = $2
             ORDER BY id"
        ))
        .bind(user_id)
        .bind(material_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn find_material(
        &self,
        material_id: &str,
    ) -> Result<Option<LearningMaterial>, MetricSourceError> {
        let material = sqlx::query_as::<_, LearningMaterial>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM learning_materials WHERE id = $1"
        ))
        .bind(material_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(material)
    }

    async fn course_materials(
        &self,
        course_id: &str,
    ) -> Result<Vec<LearningMaterial>, MetricSourceError> {
        let materials = sqlx::query_as::<_, LearningMaterial>(&format!(
            "SELECT {MATERIAL_COLUMNS}
             FROM learning_materials
             WHERE course_id = $1
             ORDER BY order_index, id"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(materials)
    }

    async fn course_students(&self, course_id: &str) -> Result<Vec<String>, MetricSourceError> {
        let students = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM course_students WHERE course_id = $1 ORDER BY user_id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn material_students(
        &self,
        material_id: &str,
    ) -> Result<Vec<String>, MetricSourceError> {
        let students = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT user_id
             FROM question_metrics
             WHERE learning_material_id = $1
             ORDER BY user_id",
        )
        .bind(material_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }
}
