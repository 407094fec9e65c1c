use std::future::Future;

use serde::{Deserialize, Serialize};

use super::{ClassificationError, ClassificationService};
use crate::db::models::ClassificationResult;
use crate::db::types::{ClassificationMethod, CognitiveLevel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum BatchTarget {
    Course(String),
    Material(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BatchPhase {
    Material,
    Course,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct ProgressEvent {
    pub(crate) phase: BatchPhase,
    pub(crate) current_step: usize,
    pub(crate) total_steps: usize,
    pub(crate) progress_percentage: f64,
}

impl ProgressEvent {
    pub(crate) fn new(phase: BatchPhase, current_step: usize, total_steps: usize) -> Self {
        let progress_percentage = if total_steps == 0 {
            100.0
        } else {
            (current_step as f64 / total_steps as f64 * 10_000.0).round() / 100.0
        };
        Self { phase, current_step, total_steps, progress_percentage }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutcomeStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StudentOutcome {
    pub(crate) student_id: String,
    pub(crate) status: OutcomeStatus,
    pub(crate) result_id: Option<String>,
    pub(crate) level: Option<CognitiveLevel>,
    pub(crate) score: Option<f64>,
    pub(crate) error: Option<String>,
}

impl StudentOutcome {
    fn succeeded(student_id: &str, result: &ClassificationResult) -> Self {
        Self {
            student_id: student_id.to_string(),
            status: OutcomeStatus::Succeeded,
            result_id: Some(result.id.clone()),
            level: Some(result.classification_level),
            score: Some(result.classification_score),
            error: None,
        }
    }

    fn unsuccessful(student_id: &str, status: OutcomeStatus, err: &ClassificationError) -> Self {
        Self {
            student_id: student_id.to_string(),
            status,
            result_id: None,
            level: None,
            score: None,
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchReport {
    pub(crate) target: BatchTarget,
    pub(crate) classification_type: ClassificationMethod,
    pub(crate) total_students: usize,
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
    pub(crate) skipped: usize,
    pub(crate) outcomes: Vec<StudentOutcome>,
}

impl BatchReport {
    fn new(target: BatchTarget, method: ClassificationMethod, outcomes: Vec<StudentOutcome>) -> Self {
        let count = |status: OutcomeStatus| outcomes.iter().filter(|outcome| outcome.status == status).count();
        Self {
            total_students: outcomes.len(),
            succeeded: count(OutcomeStatus::Succeeded),
            failed: count(OutcomeStatus::Failed),
            skipped: count(OutcomeStatus::Skipped),
            target,
            classification_type: method,
            outcomes,
        }
    }
}

impl ClassificationService {
    /// Classifies every eligible student in scope. One student's failure
    /// never aborts the batch.
    pub(crate) async fn run_classification(
        &self,
        target: BatchTarget,
        method: ClassificationMethod,
    ) -> Result<BatchReport, ClassificationError> {
        let outcomes = match &target {
            BatchTarget::Material(material_id) => self.run_material_batch(material_id, method).await?,
            BatchTarget::Course(course_id) => self.run_course_batch(course_id, method).await?,
        };
        let report = BatchReport::new(target, method, outcomes);

        tracing::info!(
            total = report.total_students,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Classification batch finished"
        );
        Ok(report)
    }

    async fn run_material_batch(
        &self,
        material_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<StudentOutcome>, ClassificationError> {
        if self.upstream("find material", self.source().find_material(material_id)).await?.is_none() {
            return Err(ClassificationError::NotFound(format!("learning material {material_id}")));
        }
        let students =
            self.upstream("material students", self.source().material_students(material_id)).await?;

        let mut outcomes = Vec::with_capacity(students.len());
        for (index, student_id) in students.iter().enumerate() {
            let outcome = match self
                .with_retries(student_id, move || self.classify_material(student_id, material_id, method))
                .await
            {
                Ok(result) => StudentOutcome::succeeded(student_id, &result),
                Err(err @ ClassificationError::InsufficientData(_)) => {
                    StudentOutcome::unsuccessful(student_id, OutcomeStatus::Skipped, &err)
                }
                Err(err) => StudentOutcome::unsuccessful(student_id, OutcomeStatus::Failed, &err),
            };
            report_progress(student_id, ProgressEvent::new(BatchPhase::Material, index + 1, students.len()));
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn run_course_batch(
        &self,
        course_id: &str,
        method: ClassificationMethod,
    ) -> Result<Vec<StudentOutcome>, ClassificationError> {
        let materials =
            self.upstream("course materials", self.source().course_materials(course_id)).await?;
        let students =
            self.upstream("course students", self.source().course_students(course_id)).await?;
        let total = students.len();

        let mut outcomes = Vec::with_capacity(total);
        for (index, student_id) in students.iter().enumerate() {
            let mut material_failure = None;
            for material in &materials {
                let attempt = self
                    .with_retries(student_id, move || {
                        self.classify_material(student_id, &material.id, method)
                    })
                    .await;
                match attempt {
                    Ok(_) | Err(ClassificationError::InsufficientData(_)) => {}
                    Err(ClassificationError::InvalidMetric { dropped }) => {
                        tracing::warn!(
                            student_id = %student_id,
                            material_id = %material.id,
                            dropped = dropped.len(),
                            "Material skipped in batch: every metric row was rejected"
                        );
                    }
                    Err(err) => {
                        material_failure = Some(err);
                        break;
                    }
                }
            }
            report_progress(student_id, ProgressEvent::new(BatchPhase::Material, index + 1, total));

            let outcome = match material_failure {
                Some(err) => StudentOutcome::unsuccessful(student_id, OutcomeStatus::Failed, &err),
                None => match self
                    .with_retries(student_id, move || self.classify_course(student_id, course_id, method))
                    .await
                {
                    Ok(result) => StudentOutcome::succeeded(student_id, &result),
                    Err(err @ ClassificationError::InsufficientData(_)) => {
                        StudentOutcome::unsuccessful(student_id, OutcomeStatus::Skipped, &err)
                    }
                    Err(err) => {
                        StudentOutcome::unsuccessful(student_id, OutcomeStatus::Failed, &err)
                    }
                },
            };
            report_progress(student_id, ProgressEvent::new(BatchPhase::Course, index + 1, total));
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Retries upstream outages with linear backoff.
    async fn with_retries<F, Fut>(
        &self,
        student_id: &str,
        mut run: F,
    ) -> Result<ClassificationResult, ClassificationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ClassificationResult, ClassificationError>>,
    {
        let max_retries = self.settings().batch_max_retries;
        let mut attempt: u32 = 0;
        loop {
            match run().await {
                Err(err) if err.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = self.batch_backoff() * attempt;
                    tracing::warn!(
                        student_id = %student_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying classification after upstream failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }
}

fn report_progress(student_id: &str, event: ProgressEvent) {
    tracing::info!(
        student_id = %student_id,
        phase = ?event.phase,
        current_step = event.current_step,
        total_steps = event.total_steps,
        progress_percentage = event.progress_percentage,
        "Classification batch progress"
    );
}
