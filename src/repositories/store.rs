use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use super::is_connectivity_error;

use crate::db::models::{ClassificationHistoryEntry, ClassificationResult};
use crate::db::types::{ClassificationMethod, ClassificationScope};

/// The (student, scope, unit, method) identity that writes serialise on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ClassificationKey {
    pub(crate) user_id: String,
    pub(crate) scope: ClassificationScope,
    pub(crate) scope_id: String,
    pub(crate) method: ClassificationMethod,
}

impl ClassificationKey {
    pub(crate) fn new(
        user_id: impl Into<String>,
        scope: ClassificationScope,
        scope_id: impl Into<String>,
        method: ClassificationMethod,
    ) -> Self {
        Self { user_id: user_id.into(), scope, scope_id: scope_id.into(), method }
    }

    pub(crate) fn of(result: &ClassificationResult) -> Self {
        Self::new(
            result.user_id.clone(),
            result.scope,
            result.scope_id(),
            result.classification_type,
        )
    }
}

impl fmt::Display for ClassificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.user_id,
            self.scope.as_str(),
            self.scope_id,
            self.method.as_str()
        )
    }
}

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    /// Another writer already holds this key at the same instant.
    #[error("write conflict on {0}")]
    Conflict(String),
    #[error("result store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(sqlx::Error),
    #[error("raw data encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_connectivity_error(&err) {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

/// Append-only storage for classification results and course history.
#[async_trait]
pub(crate) trait ClassificationStore: Send + Sync {
    /// Persists `result`. While holding the key's write lock the store moves
    /// `classified_at` past the latest stored timestamp for the key.
    async fn insert_result(&self, result: &mut ClassificationResult) -> Result<(), StoreError>;

    /// Writes a course-scope result and its history entry atomically, with the
    /// same timestamp rule as [`ClassificationStore::insert_result`]. Both rows
    /// carry the final `classified_at`.
    async fn insert_course_result(
        &self,
        result: &mut ClassificationResult,
        entry: &mut ClassificationHistoryEntry,
    ) -> Result<(), StoreError>;

    async fn find_result(&self, id: &str) -> Result<Option<ClassificationResult>, StoreError>;

    async fn latest_result(
        &self,
        key: &ClassificationKey,
    ) -> Result<Option<ClassificationResult>, StoreError>;

    /// Latest material-scope result per material for one student in a course.
    async fn latest_material_results(
        &self,
        user_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationResult>, StoreError>;

    /// Latest course-scope result per student.
    async fn latest_course_results(
        &self,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationResult>, StoreError>;

    /// History entries oldest first.
    async fn history(
        &self,
        user_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationHistoryEntry>, StoreError>;

    async fn health(&self) -> Result<(), StoreError>;
}
