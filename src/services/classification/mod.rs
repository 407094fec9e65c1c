//! Cognitive classification engine: telemetry in, Bloom's level out.
//!
//! Material runs score one row per question; course runs re-score the
//! student's latest material results one level up. Every run is computed in
//! memory and persisted as a new immutable result.

pub(crate) mod aggregator;
pub(crate) mod batch;
pub(crate) mod criteria;
pub(crate) mod error;
pub(crate) mod level;
pub(crate) mod matrix;
pub(crate) mod model;
pub(crate) mod recommendations;
pub(crate) mod recorder;
pub(crate) mod scorer;
pub(crate) mod topsis;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) use error::ClassificationError;

use self::aggregator::{aggregate, course_inputs, mean};
use self::matrix::build_material_matrix;
use self::model::{CalculationDetails, CourseRawData, MaterialRawData, MaterialSummary};
use self::recommendations::{recommendations, weak_areas};
use self::recorder::{trend, ClassificationRecorder, NewClassification, Trend};
use self::scorer::ScorerRegistry;
use crate::core::config::ClassificationSettings;
use crate::core::metrics;
use crate::db::models::{ClassificationHistoryEntry, ClassificationResult};
use crate::db::types::{ClassificationMethod, ClassificationScope, CognitiveLevel};
use crate::repositories::metric_source::{MetricSource, MetricSourceError};
use crate::repositories::store::{ClassificationKey, ClassificationStore};

#[derive(Debug, Clone)]
pub(crate) struct HistoryView {
    pub(crate) entries: Vec<ClassificationHistoryEntry>,
    pub(crate) trend: Option<Trend>,
}

#[derive(Debug, Clone)]
pub(crate) struct CourseReport {
    pub(crate) course_id: String,
    pub(crate) method: ClassificationMethod,
    pub(crate) level_distribution: BTreeMap<CognitiveLevel, usize>,
    pub(crate) average_score: Option<f64>,
    pub(crate) results: Vec<ClassificationResult>,
}

impl CourseReport {
    pub(crate) fn total_students(&self) -> usize {
        self.results.len()
    }
}

#[derive(Clone)]
pub(crate) struct ClassificationService {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn MetricSource>,
    recorder: ClassificationRecorder,
    scorers: ScorerRegistry,
    settings: ClassificationSettings,
}

impl ClassificationService {
    pub(crate) fn new(
        source: Arc<dyn MetricSource>,
        store: Arc<dyn ClassificationStore>,
        settings: ClassificationSettings,
    ) -> Self {
        Self::with_scorers(source, store, settings, ScorerRegistry::default())
    }

    pub(crate) fn with_scorers(
        source: Arc<dyn MetricSource>,
        store: Arc<dyn ClassificationStore>,
        settings: ClassificationSettings,
        scorers: ScorerRegistry,
    ) -> Self {
        let recorder = ClassificationRecorder::new(store, settings.store_timeout);
        Self { inner: Arc::new(Inner { source, recorder, scorers, settings }) }
    }

    pub(crate) fn settings(&self) -> &ClassificationSettings {
        &self.inner.settings
    }

    pub(crate) async fn classify_material(
        &self,
        student_id: &str,
        material_id: &str,
        method: ClassificationMethod,
    ) -> Result<ClassificationResult, ClassificationError> {
        let started = Instant::now();
        let outcome = self.score_material(student_id, material_id, method).await;
        observe(ClassificationScope::Material, student_id, material_id, &outcome, started);
        outcome
    }

    async fn score_material(
        &self,
        student_id: &str,
        material_id: &str,
        method: ClassificationMethod,
    ) -> Result<ClassificationResult, ClassificationError> {
        let scorer = self.inner.scorers.get(method)?;
        let material = self
            .upstream("find material", self.inner.source.find_material(material_id))
            .await?
            .ok_or_else(|| ClassificationError::NotFound(format!("learning material {material_id}")))?;
        let records = self
            .upstream("fetch metrics", self.inner.source.fetch_metrics(student_id, material_id))
            .await?;

        let built = build_material_matrix(&records, &self.inner.settings.anchors)?;
        metrics::record_dropped_rows(built.dropped.len());

        let weights = &self.inner.settings.material_weights;
        let scoring = scorer.score(&built.matrix, weights)?;
        let score = mean(&scoring.closeness);
        let level = CognitiveLevel::from_score(score);
        let weak = weak_areas(built.matrix.columns(), &scoring.criterion_gaps);

        let raw_data = MaterialRawData {
            method,
            material_id: material.id.clone(),
            summary: MaterialSummary::from_questions(&built.questions),
            criteria: built.matrix.columns().to_vec(),
            weights: weights.as_slice().to_vec(),
            dropped_rows: built.dropped,
            unit_ids: built.matrix.unit_labels().to_vec(),
            unit_scores: scoring.closeness,
            trace: scoring.trace,
            recommendations: recommendations(&weak, level),
            weak_areas: weak,
        };

        self.inner
            .recorder
            .record(NewClassification {
                user_id: student_id.to_string(),
                course_id: material.course_id,
                material_id: Some(material.id),
                method,
                level,
                score,
                raw_data: encode(&raw_data)?,
            })
            .await
    }

    pub(crate) async fn classify_course(
        &self,
        student_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<ClassificationResult, ClassificationError> {
        let started = Instant::now();
        let outcome = self.score_course(student_id, course_id, method).await;
        observe(ClassificationScope::Course, student_id, course_id, &outcome, started);
        outcome
    }

    async fn score_course(
        &self,
        student_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<ClassificationResult, ClassificationError> {
        let scorer = self.inner.scorers.get(method)?;
        // Always the latest result per material, read at run time.
        let material_results =
            self.inner.recorder.latest_material_results(student_id, course_id, method).await?;
        let collected = course_inputs(&material_results)?;

        let weights = &self.inner.settings.course_weights;
        let aggregate = aggregate(&collected.inputs, scorer, weights)?;
        let weak = weak_areas(aggregate.matrix.columns(), &aggregate.scoring.criterion_gaps);
        let material_scores: Vec<f64> =
            collected.materials.iter().map(|material| material.score).collect();

        let raw_data = CourseRawData {
            method,
            calculation_details: CalculationDetails {
                material_count: collected.materials.len(),
                average_score: mean(&material_scores),
                test_case_metrics: collected.test_case_metrics,
                criteria: aggregate.matrix.columns().to_vec(),
                weights: weights.as_slice().to_vec(),
                unit_ids: aggregate.matrix.unit_labels().to_vec(),
                unit_scores: aggregate.scoring.closeness,
            },
            material_classifications: collected.materials,
            trace: aggregate.scoring.trace,
            recommendations: recommendations(&weak, aggregate.level),
            weak_areas: weak,
        };

        self.inner
            .recorder
            .record(NewClassification {
                user_id: student_id.to_string(),
                course_id: course_id.to_string(),
                material_id: None,
                method,
                level: aggregate.level,
                score: aggregate.score,
                raw_data: encode(&raw_data)?,
            })
            .await
    }

    pub(crate) async fn get_details(
        &self,
        result_id: &str,
    ) -> Result<ClassificationResult, ClassificationError> {
        self.inner
            .recorder
            .find(result_id)
            .await?
            .ok_or_else(|| ClassificationError::NotFound(format!("classification {result_id}")))
    }

    pub(crate) async fn latest(
        &self,
        scope: ClassificationScope,
        scope_id: &str,
        student_id: &str,
        method: ClassificationMethod,
    ) -> Result<Option<ClassificationResult>, ClassificationError> {
        let key = ClassificationKey::new(student_id, scope, scope_id, method);
        self.inner.recorder.latest(&key).await
    }

    pub(crate) async fn get_history(
        &self,
        student_id: &str,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<HistoryView, ClassificationError> {
        let entries = self.inner.recorder.history(student_id, course_id, method).await?;
        let trend = trend(&entries);
        Ok(HistoryView { entries, trend })
    }

    pub(crate) async fn course_report(
        &self,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<CourseReport, ClassificationError> {
        let results = self.inner.recorder.latest_course_results(course_id, method).await?;

        let mut level_distribution: BTreeMap<CognitiveLevel, usize> =
            CognitiveLevel::ALL.iter().map(|level| (*level, 0)).collect();
        for result in &results {
            *level_distribution.entry(result.classification_level).or_default() += 1;
        }
        let scores: Vec<f64> = results.iter().map(|result| result.classification_score).collect();
        let average_score = (!scores.is_empty()).then(|| mean(&scores));

        Ok(CourseReport {
            course_id: course_id.to_string(),
            method,
            level_distribution,
            average_score,
            results,
        })
    }

    pub(crate) async fn health(&self) -> Result<(), ClassificationError> {
        self.inner.recorder.health().await
    }

    async fn upstream<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, MetricSourceError>>,
    ) -> Result<T, ClassificationError> {
        let limit = self.inner.settings.upstream_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome.map_err(ClassificationError::from),
            Err(_) => Err(ClassificationError::UpstreamUnavailable(format!(
                "metric source {operation} exceeded {}ms",
                limit.as_millis()
            ))),
        }
    }

    fn source(&self) -> &dyn MetricSource {
        self.inner.source.as_ref()
    }

    fn batch_backoff(&self) -> Duration {
        self.inner.settings.batch_retry_backoff
    }
}

fn encode<T: serde::Serialize>(raw_data: &T) -> Result<serde_json::Value, ClassificationError> {
    serde_json::to_value(raw_data)
        .map_err(|err| ClassificationError::Storage(format!("raw data encoding failed: {err}")))
}

fn observe(
    scope: ClassificationScope,
    student_id: &str,
    scope_id: &str,
    outcome: &Result<ClassificationResult, ClassificationError>,
    started: Instant,
) {
    let status = match outcome {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };
    metrics::record_run(scope.as_str(), status, started.elapsed());

    if let Err(err) = outcome {
        tracing::warn!(
            student_id = %student_id,
            scope = scope.as_str(),
            scope_id = %scope_id,
            error = %err,
            "Classification run failed"
        );
    }
}

#[cfg(test)]
mod tests;
