use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use time::PrimitiveDateTime;

use super::store::{ClassificationKey, ClassificationStore, StoreError};
use crate::core::time::strictly_after;
use crate::db::models::{ClassificationHistoryEntry, ClassificationResult};
use crate::db::types::{ClassificationMethod, ClassificationScope};

pub(crate) const COLUMNS: &str = "\
    id, user_id, course_id, learning_material_id, scope, classification_type, \
    classification_level, classification_score, raw_data, classified_at";

pub(crate) const HISTORY_COLUMNS: &str = "\
    id, user_id, course_id, classification_result_id, classification_type, \
    classification_level, classification_score, raw_data, classified_at";

#[derive(Clone)]
pub(crate) struct PgClassificationStore {
    pool: PgPool,
}

impl PgClassificationStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClassificationStore for PgClassificationStore {
    async fn insert_result(&self, result: &mut ClassificationResult) -> Result<(), StoreError> {
        let key = ClassificationKey::of(result);
        let mut tx = begin_locked(&self.pool, &key).await?;
        result.classified_at =
            strictly_after(result.classified_at, latest_classified_at(&mut *tx, &key).await?);

        insert_result_row(&mut *tx, result).await.map_err(|err| write_error(err, &key))?;

        tx.commit().await?;
        Ok(())
    }

    async fn insert_course_result(
        &self,
        result: &mut ClassificationResult,
        entry: &mut ClassificationHistoryEntry,
    ) -> Result<(), StoreError> {
        let key = ClassificationKey::of(result);
        let mut tx = begin_locked(&self.pool, &key).await?;
        result.classified_at =
            strictly_after(result.classified_at, latest_classified_at(&mut *tx, &key).await?);
        entry.classified_at = result.classified_at;

        insert_result_row(&mut *tx, result).await.map_err(|err| write_error(err, &key))?;

        sqlx::query(&format!(
            "INSERT INTO course_classification_histories ({HISTORY_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(&entry.course_id)
        .bind(&entry.classification_result_id)
        .bind(entry.classification_type)
        .bind(entry.classification_level)
        .bind(entry.classification_score)
        .bind(&entry.raw_data)
        .bind(entry.classified_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| write_error(err, &key))?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_result(&self, id: &str) -> Result<Option<ClassificationResult>, StoreError> {
        let result = sqlx::query_as::<_, ClassificationResult>(&format!(
            "SELECT {COLUMNS} FROM classification_results WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(result)
    }

    async fn latest_result(
        &self,
        key: &ClassificationKey,
    ) -> Result<Option<ClassificationResult>, StoreError> {
        let result = sqlx::query_as::<_, ClassificationResult>(&format!(
            "SELECT {COLUMNS}
             FROM classification_results
             WHERE user_id = $1
               AND scope = $2
               AND COALESCE(learning_material_id, course_id) = $3
               AND classification_type = $4
             ORDER BY classified_at DESC
             LIMIT 1"
        ))
        .bind(&key.user_id)
        .bind(key.scope)
        .bind(&key.scope_id)
        .bind(key.method)
        .fetch_optional(&self.pool)
        .await?;
        Ok(result)
    }

    async fn latest_material_results(
        &self,
        user_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationResult>, StoreError> {
        let results = sqlx::query_as::<_, ClassificationResult>(&format!(
            "SELECT DISTINCT ON (learning_material_id) {COLUMNS}
             FROM classification_results
             WHERE user_id = $1 AND course_id = $2 AND scope = $3 AND classification_type = $4
             ORDER BY learning_material_id, classified_at DESC"
        ))
        .bind(user_id)
        .bind(course_id)
        .bind(ClassificationScope::Material)
        .bind(method)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    async fn latest_course_results(
        &self,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationResult>, StoreError> {
        let results = sqlx::query_as::<_, ClassificationResult>(&format!(
            "SELECT DISTINCT ON (user_id) {COLUMNS}
             FROM classification_results
             WHERE course_id = $1 AND scope = $2 AND classification_type = $3
             ORDER BY user_id, classified_at DESC"
        ))
        .bind(course_id)
        .bind(ClassificationScope::Course)
        .bind(method)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }

    async fn history(
        &self,
        user_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationHistoryEntry>, StoreError> {
        let entries = sqlx::query_as::<_, ClassificationHistoryEntry>(&format!(
            "SELECT {HISTORY_COLUMNS}
             FROM course_classification_histories
             WHERE user_id = $1 AND course_id = $2 AND classification_type = $3
             ORDER BY classified_at ASC"
        ))
        .bind(user_id)
        .bind(course_id)
        .bind(method)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Opens a transaction holding the key's advisory lock until commit, which
/// serialises writers on other instances.
async fn begin_locked(
    pool: &PgPool,
    key: &ClassificationKey,
) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key.to_string())
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

async fn latest_classified_at<'e, E>(
    executor: E,
    key: &ClassificationKey,
) -> Result<Option<PrimitiveDateTime>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, Option<PrimitiveDateTime>>(
        "SELECT MAX(classified_at)
         FROM classification_results
         WHERE user_id = $1
           AND scope = $2
           AND COALESCE(learning_material_id, course_id) = $3
           AND classification_type = $4",
    )
    .bind(&key.user_id)
    .bind(key.scope)
    .bind(&key.scope_id)
    .bind(key.method)
    .fetch_one(executor)
    .await
}

async fn insert_result_row<'e, E>(executor: E, result: &ClassificationResult) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(&format!(
        "INSERT INTO classification_results ({COLUMNS})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    ))
    .bind(&result.id)
    .bind(&result.user_id)
    .bind(&result.course_id)
    .bind(&result.learning_material_id)
    .bind(result.scope)
    .bind(result.classification_type)
    .bind(result.classification_level)
    .bind(result.classification_score)
    .bind(&result.raw_data)
    .bind(result.classified_at)
    .execute(executor)
    .await?;
    Ok(())
}

fn write_error(err: sqlx::Error, key: &ClassificationKey) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(key.to_string())
        }
        _ => StoreError::from(err),
    }
}
