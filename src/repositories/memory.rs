//! In-process store and metric source used by the engine and HTTP tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::metric_source::{MetricRecord, MetricSource, MetricSourceError};
use super::store::{ClassificationKey, ClassificationStore, StoreError};
use crate::core::time::strictly_after;
use crate::db::models::{ClassificationHistoryEntry, ClassificationResult, LearningMaterial};
use crate::db::types::{ClassificationMethod, ClassificationScope};

#[derive(Default)]
pub(crate) struct MemoryStore {
    results: Mutex<Vec<ClassificationResult>>,
    history: Mutex<Vec<ClassificationHistoryEntry>>,
    forced_conflicts: AtomicUsize,
    unavailable: AtomicBool,
    insert_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The next `count` inserts fail with a conflict.
    pub(crate) fn force_conflicts(&self, count: usize) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn set_insert_delay(&self, delay: Option<Duration>) {
        *self.insert_delay.lock().expect("delay lock") = delay;
    }

    pub(crate) fn results(&self) -> Vec<ClassificationResult> {
        self.results.lock().expect("results lock").clone()
    }

    pub(crate) fn history_entries(&self) -> Vec<ClassificationHistoryEntry> {
        self.history.lock().expect("history lock").clone()
    }

    pub(crate) fn seed_result(&self, result: ClassificationResult) {
        self.results.lock().expect("results lock").push(result);
    }

    async fn before_write(&self, key: &ClassificationKey) -> Result<(), StoreError> {
        self.check_available()?;
        let delay = *self.insert_delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let forced = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if forced {
            return Err(StoreError::Conflict(key.to_string()));
        }
        Ok(())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    /// Appends under the results lock, moving `classified_at` past the key's latest.
    fn push_result(&self, result: &mut ClassificationResult) {
        let key = ClassificationKey::of(result);
        let mut results = self.results.lock().expect("results lock");
        let latest = results
            .iter()
            .filter(|existing| ClassificationKey::of(existing) == key)
            .map(|existing| existing.classified_at)
            .max();
        result.classified_at = strictly_after(result.classified_at, latest);
        results.push(result.clone());
    }
}

#[async_trait]
impl ClassificationStore for MemoryStore {
    async fn insert_result(&self, result: &mut ClassificationResult) -> Result<(), StoreError> {
        self.before_write(&ClassificationKey::of(result)).await?;
        self.push_result(result);
        Ok(())
    }

    async fn insert_course_result(
        &self,
        result: &mut ClassificationResult,
        entry: &mut ClassificationHistoryEntry,
    ) -> Result<(), StoreError> {
        self.before_write(&ClassificationKey::of(result)).await?;
        self.push_result(result);
        entry.classified_at = result.classified_at;
        self.history.lock().expect("history lock").push(entry.clone());
        Ok(())
    }

    async fn find_result(&self, id: &str) -> Result<Option<ClassificationResult>, StoreError> {
        self.check_available()?;
        Ok(self.results().into_iter().find(|result| result.id == id))
    }

    async fn latest_result(
        &self,
        key: &ClassificationKey,
    ) -> Result<Option<ClassificationResult>, StoreError> {
        self.check_available()?;
        Ok(self
            .results()
            .into_iter()
            .filter(|result| ClassificationKey::of(result) == *key)
            .max_by_key(|result| result.classified_at))
    }

    async fn latest_material_results(
        &self,
        user_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationResult>, StoreError> {
        self.check_available()?;
        let mut latest: BTreeMap<String, ClassificationResult> = BTreeMap::new();
        for result in self.results() {
            if result.user_id != user_id
                || result.course_id != course_id
                || result.scope != ClassificationScope::Material
                || result.classification_type != method
            {
                continue;
            }
            let material_id = result.scope_id().to_string();
            let newer = latest
                .get(&material_id)
                .map_or(true, |current| result.classified_at > current.classified_at);
            if newer {
                latest.insert(material_id, result);
            }
        }
        Ok(latest.into_values().collect())
    }

    async fn latest_course_results(
        &self,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationResult>, StoreError> {
        self.check_available()?;
        let mut latest: BTreeMap<String, ClassificationResult> = BTreeMap::new();
        for result in self.results() {
            if result.course_id != course_id
                || result.scope != ClassificationScope::Course
                || result.classification_type != method
            {
                continue;
            }
            let newer = latest
                .get(&result.user_id)
                .map_or(true, |current| result.classified_at > current.classified_at);
            if newer {
                latest.insert(result.user_id.clone(), result);
            }
        }
        Ok(latest.into_values().collect())
    }

    async fn history(
        &self,
        user_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<ClassificationHistoryEntry>, StoreError> {
        self.check_available()?;
        let mut entries: Vec<ClassificationHistoryEntry> = self
            .history_entries()
            .into_iter()
            .filter(|entry| {
                entry.user_id == user_id
                    && entry.course_id == course_id
                    && entry.classification_type == method
            })
            .collect();
        entries.sort_by_key(|entry| entry.classified_at);
        Ok(entries)
    }

    async fn health(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[derive(Default)]
pub(crate) struct MemorySource {
    metrics: Mutex<HashMap<(String, String), Vec<MetricRecord>>>,
    materials: Mutex<Vec<LearningMaterial>>,
    enrolments: Mutex<HashMap<String, Vec<String>>>,
    outages: Mutex<HashMap<String, usize>>,
}

impl MemorySource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_material(&self, course_id: &str, material_id: &str) {
        self.materials.lock().expect("materials lock").push(LearningMaterial {
            id: material_id.to_string(),
            course_id: course_id.to_string(),
            title: format!("Material {material_id}"),
        });
    }

    pub(crate) fn enrol(&self, course_id: &str, user_id: &str) {
        self.enrolments
            .lock()
            .expect("enrolments lock")
            .entry(course_id.to_string())
            .or_default()
            .push(user_id.to_string());
    }

    pub(crate) fn add_metrics(&self, user_id: &str, material_id: &str, records: Vec<MetricRecord>) {
        self.metrics
            .lock()
            .expect("metrics lock")
            .entry((user_id.to_string(), material_id.to_string()))
            .or_default()
            .extend(records);
    }

    /// The next `count` metric reads for the student fail as unavailable.
    pub(crate) fn fail_reads(&self, user_id: &str, count: usize) {
        self.outages.lock().expect("outages lock").insert(user_id.to_string(), count);
    }

    fn check_outage(&self, user_id: &str) -> Result<(), MetricSourceError> {
        let mut outages = self.outages.lock().expect("outages lock");
        match outages.get_mut(user_id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(MetricSourceError::Unavailable(format!("metrics for {user_id} offline")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MetricSource for MemorySource {
    async fn fetch_metrics(
        &self,
        user_id: &str,
        material_id: &str,
    ) -> Result<Vec<MetricRecord>, MetricSourceError> {
        self.check_outage(user_id)?;
        let metrics = self.metrics.lock().expect("metrics lock");
        Ok(metrics
            .get(&(user_id.to_string(), material_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn find_material(
        &self,
        material_id: &str,
    ) -> Result<Option<LearningMaterial>, MetricSourceError> {
        let materials = self.materials.lock().expect("materials lock");
        Ok(materials.iter().find(|material| material.id == material_id).cloned())
    }

    async fn course_materials(
        &self,
        course_id: &str,
    ) -> Result<Vec<LearningMaterial>, MetricSourceError> {
        let materials = self.materials.lock().expect("materials lock");
        Ok(materials.iter().filter(|material| material.course_id == course_id).cloned().collect())
    }

    async fn course_students(&self, course_id: &str) -> Result<Vec<String>, MetricSourceError> {
        let enrolments = self.enrolments.lock().expect("enrolments lock");
        Ok(enrolments.get(course_id).cloned().unwrap_or_default())
    }

    async fn material_students(
        &self,
        material_id: &str,
    ) -> Result<Vec<String>, MetricSourceError> {
        let metrics = self.metrics.lock().expect("metrics lock");
        let mut students: Vec<String> = metrics
            .keys()
            .filter(|(_, material)| material == material_id)
            .map(|(user, _)| user.clone())
            .collect();
        students.sort();
        students.dedup();
        Ok(students)
    }
}
