use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::error::ClassificationError;
use crate::core::time::primitive_now_utc;
use crate::db::models::{ClassificationHistoryEntry, ClassificationResult};
use crate::db::types::{ClassificationMethod, ClassificationScope, CognitiveLevel};
use crate::repositories::store::{ClassificationKey, ClassificationStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Trend {
    Improved,
    Declined,
    Unchanged,
}

/// Compares the two most recent entries; `entries` are oldest first.
pub(crate) fn trend(entries: &[ClassificationHistoryEntry]) -> Option<Trend> {
    let [.., previous, latest] = entries else {
        return None;
    };
    let trend = if latest.classification_score > previous.classification_score {
        Trend::Improved
    } else if latest.classification_score < previous.classification_score {
        Trend::Declined
    } else {
        Trend::Unchanged
    };
    Some(trend)
}

/// A computed classification waiting to be persisted.
#[derive(Debug, Clone)]
pub(crate) struct NewClassification {
    pub(crate) user_id: String,
    pub(crate) course_id: String,
    pub(crate) material_id: Option<String>,
    pub(crate) method: ClassificationMethod,
    pub(crate) level: CognitiveLevel,
    pub(crate) score: f64,
    pub(crate) raw_data: serde_json::Value,
}

impl NewClassification {
    fn scope(&self) -> ClassificationScope {
        if self.material_id.is_some() {
            ClassificationScope::Material
        } else {
            ClassificationScope::Course
        }
    }

    fn key(&self) -> ClassificationKey {
        let scope_id = self.material_id.as_deref().unwrap_or(&self.course_id);
        ClassificationKey::new(self.user_id.clone(), self.scope(), scope_id, self.method)
    }
}

/// Writes immutable results and, for course scope, their history entries.
/// Writes for one key never interleave within this process.
pub(crate) struct ClassificationRecorder {
    store: Arc<dyn ClassificationStore>,
    timeout: Duration,
    locks: Mutex<HashMap<ClassificationKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ClassificationRecorder {
    pub(crate) fn new(store: Arc<dyn ClassificationStore>, timeout: Duration) -> Self {
        Self { store, timeout, locks: Mutex::new(HashMap::new()) }
    }

    pub(crate) async fn record(
        &self,
        new: NewClassification,
    ) -> Result<ClassificationResult, ClassificationError> {
        let key = new.key();
        let lock = self.key_lock(&key);
        let outcome = {
            let _guard = lock.lock().await;
            self.write_with_retry(&key, &new).await
        };
        drop(lock);
        self.release_idle_locks();
        outcome
    }

    async fn write_with_retry(
        &self,
        key: &ClassificationKey,
        new: &NewClassification,
    ) -> Result<ClassificationResult, ClassificationError> {
        match self.write(new).await {
            Err(ClassificationError::ConcurrentWriteConflict(_)) => {
                tracing::warn!(key = %key, "Classification write conflicted; retrying once");
                self.write(new).await
            }
            outcome => outcome,
        }
    }

    /// The store settles the final `classified_at` inside its write lock.
    async fn write(&self, new: &NewClassification) -> Result<ClassificationResult, ClassificationError> {
        let mut result = ClassificationResult {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id.clone(),
            course_id: new.course_id.clone(),
            learning_material_id: new.material_id.clone(),
            scope: new.scope(),
            classification_type: new.method,
            classification_level: new.level,
            classification_score: new.score,
            raw_data: Json(new.raw_data.clone()),
            classified_at: primitive_now_utc(),
        };

        match result.scope {
            ClassificationScope::Material => {
                self.timed("insert", self.store.insert_result(&mut result)).await?;
            }
            ClassificationScope::Course => {
                let mut entry =
                    ClassificationHistoryEntry::from_result(Uuid::new_v4().to_string(), &result);
                self.timed("insert", self.store.insert_course_result(&mut result, &mut entry)).await?;
            }
        }

        tracing::info!(
            result_id = %result.id,
            student_id = %result.user_id,
            scope = result.scope.as_str(),
            scope_id = %result.scope_id(),
            level = result.classification_level.as_str(),
            score = result.classification_score,
            "Classification recorded"
        );
        Ok(result)
    }

    pub(crate) async fn latest(
        &self,
        key: &ClassificationKey,
    ) -> Result<Option<ClassificationResult>, ClassificationError> {
        self.timed("latest", self.store.latest_result(key)).await
    }

    pub(crate) async fn find(&self, id: &str) -> Result<Option<ClassificationResult>, ClassificationError> {
        self.timed("find", self.store.find_result(id)).await
    }

    pub(crate) async fn history(
        &self,
        user_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationHistoryEntry>, ClassificationError> {
        self.timed("history", self.store.history(user_id, course_id, method)).await
    }

    pub(crate) async fn latest_material_results(
        &self,
        user_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationResult>, ClassificationError> {
        self.timed(
            "latest material results",
            self.store.latest_material_results(user_id, course_id, method),
        )
        .await
    }

    pub(crate) async fn latest_course_results(
        &self,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationResult>, ClassificationError> {
        self.timed("latest course results", self.store.latest_course_results(course_id, method))
            .await
    }

    pub(crate) async fn health(&self) -> Result<(), ClassificationError> {
        self.timed("health", self.store.health()).await
    }

    async fn timed<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ClassificationError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome.map_err(ClassificationError::from),
            Err(_) => Err(ClassificationError::UpstreamUnavailable(format!(
                "result store {operation} exceeded {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    fn key_lock(&self, key: &ClassificationKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    fn release_idle_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
