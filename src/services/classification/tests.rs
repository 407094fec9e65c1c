use std::sync::Arc;

use super::batch::{BatchTarget, OutcomeStatus};
use super::scorer::ScorerRegistry;
use super::*;
use crate::repositories::memory::{MemorySource, MemoryStore};
use crate::test_support::{
    fixed_time, material_result, metric, strong_attempts, test_service, test_settings,
    weak_attempts,
};

const COURSE: &str = "course-1";

struct Fixture {
    service: ClassificationService,
    store: Arc<MemoryStore>,
    source: Arc<MemorySource>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(MemorySource::new());
    source.add_material(COURSE, "m1");
    source.add_material(COURSE, "m2");
    let service = test_service(&test_settings(), store.clone(), source.clone());
    Fixture { service, store, source }
}

const TOPSIS: ClassificationMethod = ClassificationMethod::Topsis;

#[tokio::test]
async fn strong_telemetry_outranks_weak_telemetry() {
    let fx = fixture();
    fx.source.add_metrics("alice", "m1", strong_attempts(3));
    fx.source.add_metrics("bob", "m1", weak_attempts(3));

    let strong = fx.service.classify_material("alice", "m1", TOPSIS).await.expect("alice");
    let weak = fx.service.classify_material("bob", "m1", TOPSIS).await.expect("bob");

    assert!(strong.classification_score > weak.classification_score);
    assert!(strong.classification_level >= CognitiveLevel::Analyze);
    assert_eq!(weak.classification_level, CognitiveLevel::Remember);
    assert_eq!(strong.course_id, COURSE);
    assert_eq!(strong.learning_material_id.as_deref(), Some("m1"));
}

#[tokio::test]
async fn material_raw_data_carries_summary_trace_and_advice() {
    let fx = fixture();
    let mut attempts = strong_attempts(2);
    attempts.push(metric("q3", 6.0, 900.0, 0.0, 0.4));
    fx.source.add_metrics("alice", "m1", attempts);

    let result = fx.service.classify_material("alice", "m1", TOPSIS).await.expect("result");
    let raw = &result.raw_data.0;

    assert_eq!(raw["method"], "topsis");
    assert_eq!(raw["summary"]["question_count"], 3);
    assert_eq!(raw["summary"]["completed_count"], 2);
    assert_eq!(raw["unit_ids"], serde_json::json!(["q1", "q2", "q3"]));
    assert_eq!(raw["unit_scores"].as_array().map(Vec::len), Some(3));
    assert_eq!(raw["trace"]["method"], "topsis");
    assert_eq!(raw["trace"]["row_labels"].as_array().map(Vec::len), Some(5));
    assert!(!raw["recommendations"].as_array().expect("recommendations").is_empty());
}

#[tokio::test]
async fn enormous_coding_time_still_counts_against_the_question() {
    let fx = fixture();
    let mut slow = metric("q1", 1.0, 60.0, 1.0, 1.0);
    slow.coding_time = Some(1e200);
    fx.source.add_metrics("alice", "m1", vec![slow, metric("q2", 1.0, 60.0, 1.0, 1.0)]);

    let result = fx.service.classify_material("alice", "m1", TOPSIS).await.expect("result");
    let raw = &result.raw_data.0;

    let scores: Vec<f64> = raw["unit_scores"]
        .as_array()
        .expect("unit scores")
        .iter()
        .map(|value| value.as_f64().expect("score"))
        .collect();
    assert!(scores[1] > scores[0], "{scores:?}");
    let norms = raw["trace"]["column_norms"].as_array().expect("norms");
    assert!(norms.iter().all(serde_json::Value::is_f64));
    assert_eq!(raw["trace"]["degenerate_columns"], serde_json::json!([]));
}

#[tokio::test]
async fn overflowing_attempts_drop_only_their_question() {
    let fx = fixture();
    fx.source.add_metrics(
        "alice",
        "m1",
        vec![
            metric("q1", 1.0, 1e308, 1.0, 1.0),
            metric("q1", 1.0, 1e308, 1.0, 1.0),
            metric("q2", 1.0, 60.0, 1.0, 1.0),
        ],
    );

    let result = fx.service.classify_material("alice", "m1", TOPSIS).await.expect("result");
    let raw = &result.raw_data.0;

    assert_eq!(raw["unit_ids"], serde_json::json!(["q2"]));
    assert_eq!(raw["dropped_rows"].as_array().map(Vec::len), Some(1));
    assert_eq!(raw["dropped_rows"][0]["question_id"], "q1");
}

#[tokio::test]
async fn material_without_metrics_writes_nothing() {
    let fx = fixture();

    let result = fx.service.classify_material("alice", "m1", TOPSIS).await;

    assert!(matches!(result, Err(ClassificationError::InsufficientData(_))));
    assert!(fx.store.results().is_empty());
}

#[tokio::test]
async fn fully_invalid_metrics_are_rejected() {
    let fx = fixture();
    let mut record = metric("q1", 1.0, 60.0, 1.0, 1.0);
    record.coding_time = Some(-1.0);
    fx.source.add_metrics("alice", "m1", vec![record]);

    let result = fx.service.classify_material("alice", "m1", TOPSIS).await;

    assert!(matches!(result, Err(ClassificationError::InvalidMetric { ref dropped }) if dropped.len() == 1));
    assert!(fx.store.results().is_empty());
}

#[tokio::test]
async fn unknown_material_is_not_found() {
    let fx = fixture();
    let result = fx.service.classify_material("alice", "missing", TOPSIS).await;
    assert!(matches!(result, Err(ClassificationError::NotFound(_))));
}

#[tokio::test]
async fn unregistered_method_is_unsupported() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(MemorySource::new());
    let service = ClassificationService::with_scorers(
        source,
        store,
        test_settings().classification().clone(),
        ScorerRegistry::new(Vec::new()),
    );

    let result = service.classify_course("alice", COURSE, TOPSIS).await;

    assert!(matches!(result, Err(ClassificationError::UnsupportedMethod(_))));
}

#[tokio::test]
async fn course_run_requires_a_material_result() {
    let fx = fixture();
    let result = fx.service.classify_course("alice", COURSE, TOPSIS).await;
    assert!(matches!(result, Err(ClassificationError::InsufficientData(_))));
    assert!(fx.store.history_entries().is_empty());
}

#[tokio::test]
async fn course_run_aggregates_materials_and_appends_history() {
    let fx = fixture();
    fx.source.add_metrics("alice", "m1", strong_attempts(3));
    fx.source.add_metrics("alice", "m2", strong_attempts(2));
    fx.service.classify_material("alice", "m1", TOPSIS).await.expect("m1");
    fx.service.classify_material("alice", "m2", TOPSIS).await.expect("m2");

    let result = fx.service.classify_course("alice", COURSE, TOPSIS).await.expect("course");

    assert_eq!(result.scope, ClassificationScope::Course);
    assert!(result.learning_material_id.is_none());
    assert_ne!(result.classification_level, CognitiveLevel::Remember);

    let raw = &result.raw_data.0;
    assert_eq!(raw["material_classifications"].as_array().map(Vec::len), Some(2));
    assert_eq!(raw["calculation_details"]["material_count"], 2);
    assert_eq!(raw["calculation_details"]["test_case_metrics"]["completed"], 5);
    assert_eq!(raw["calculation_details"]["test_case_metrics"]["total"], 5);

    let history = fx.service.get_history("alice", COURSE, TOPSIS).await.expect("history");
    assert_eq!(history.entries.len(), 1);
    assert_eq!(history.entries[0].classification_result_id, result.id);
    assert!(history.trend.is_none());
}

#[tokio::test]
async fn course_run_reads_the_latest_result_per_material() {
    let fx = fixture();
    let mut stale = material_result("old", "alice", COURSE, "m1", 0.1, 2, 0, 0.0);
    stale.classified_at = fixed_time(0);
    let mut fresh = material_result("new", "alice", COURSE, "m1", 0.9, 2, 2, 1.0);
    fresh.classified_at = fixed_time(60);
    fx.store.seed_result(fresh);
    fx.store.seed_result(stale);

    let result = fx.service.classify_course("alice", COURSE, TOPSIS).await.expect("course");

    let materials = &result.raw_data.0["material_classifications"];
    assert_eq!(materials.as_array().map(Vec::len), Some(1));
    assert_eq!(materials[0]["result_id"], "new");
    assert_eq!(materials[0]["score"], 0.9);
}

#[tokio::test]
async fn repeated_course_runs_keep_every_history_entry() {
    let fx = fixture();
    fx.source.add_metrics("alice", "m1", strong_attempts(2));
    fx.service.classify_material("alice", "m1", TOPSIS).await.expect("material");

    let first = fx.service.classify_course("alice", COURSE, TOPSIS).await.expect("first");
    let second = fx.service.classify_course("alice", COURSE, TOPSIS).await.expect("second");

    let history = fx.service.get_history("alice", COURSE, TOPSIS).await.expect("history");
    assert_eq!(history.entries.len(), 2);
    assert!(history.entries[1].classified_at > history.entries[0].classified_at);
    assert_eq!(history.entries[0].classification_result_id, first.id);
    assert_eq!(history.entries[0].classification_score, first.classification_score);
    assert_eq!(history.entries[1].classification_result_id, second.id);
    assert_eq!(history.trend, Some(Trend::Unchanged));

    let details = fx.service.get_details(&first.id).await.expect("first still readable");
    assert_eq!(details.classified_at, first.classified_at);
}

#[tokio::test]
async fn latest_returns_the_newest_material_result() {
    let fx = fixture();
    fx.source.add_metrics("alice", "m1", weak_attempts(2));
    fx.service.classify_material("alice", "m1", TOPSIS).await.expect("first");
    let second = fx.service.classify_material("alice", "m1", TOPSIS).await.expect("second");

    let latest = fx
        .service
        .latest(ClassificationScope::Material, "m1", "alice", TOPSIS)
        .await
        .expect("latest");

    assert_eq!(latest.map(|result| result.id), Some(second.id));
    assert!(fx
        .service
        .latest(ClassificationScope::Course, COURSE, "alice", TOPSIS)
        .await
        .expect("latest course")
        .is_none());
}

#[tokio::test]
async fn missing_result_is_not_found() {
    let fx = fixture();
    assert!(matches!(
        fx.service.get_details("nope").await,
        Err(ClassificationError::NotFound(_))
    ));
}

#[tokio::test]
async fn unavailable_store_is_reported_as_upstream_failure() {
    let fx = fixture();
    fx.source.add_metrics("alice", "m1", strong_attempts(1));
    fx.store.set_unavailable(true);

    let result = fx.service.classify_material("alice", "m1", TOPSIS).await;

    assert!(matches!(result, Err(ClassificationError::UpstreamUnavailable(_))));
    assert!(fx.service.health().await.is_err());
}

#[tokio::test]
async fn course_batch_isolates_student_failures() {
    let fx = fixture();
    for student in ["alice", "bob", "carol", "dave"] {
        fx.source.enrol(COURSE, student);
    }
    fx.source.add_metrics("alice", "m1", strong_attempts(2));
    fx.source.add_metrics("bob", "m1", weak_attempts(2));
    fx.source.add_metrics("dave", "m2", strong_attempts(1));
    // bob recovers after one outage, dave never does; carol has no telemetry.
    fx.source.fail_reads("bob", 1);
    fx.source.fail_reads("dave", 100);

    let report = fx
        .service
        .run_classification(BatchTarget::Course(COURSE.to_string()), TOPSIS)
        .await
        .expect("batch");

    assert_eq!(report.total_students, 4);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);

    let status = |student: &str| {
        report.outcomes.iter().find(|outcome| outcome.student_id == student).map(|outcome| outcome.status)
    };
    assert_eq!(status("alice"), Some(OutcomeStatus::Succeeded));
    assert_eq!(status("bob"), Some(OutcomeStatus::Succeeded));
    assert_eq!(status("carol"), Some(OutcomeStatus::Skipped));
    assert_eq!(status("dave"), Some(OutcomeStatus::Failed));

    let dave = report.outcomes.iter().find(|outcome| outcome.student_id == "dave").expect("dave");
    assert!(dave.error.as_deref().unwrap_or_default().contains("unavailable"));

    let course_report = fx.service.course_report(COURSE, TOPSIS).await.expect("report");
    assert_eq!(course_report.total_students(), 2);
    assert_eq!(course_report.level_distribution.len(), 6);
    assert_eq!(course_report.level_distribution.values().sum::<usize>(), 2);
    assert!(course_report.average_score.is_some());
}

#[tokio::test]
async fn material_batch_covers_students_with_telemetry() {
    let fx = fixture();
    fx.source.add_metrics("alice", "m1", strong_attempts(2));
    let mut invalid = metric("q1", 1.0, 1.0, 1.0, 1.0);
    invalid.test_case_completion_rate = Some(2.0);
    fx.source.add_metrics("bob", "m1", vec![invalid]);

    let report = fx
        .service
        .run_classification(BatchTarget::Material("m1".to_string()), TOPSIS)
        .await
        .expect("batch");

    assert_eq!(report.total_students, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(fx.store.results().len(), 1);
}

#[tokio::test]
async fn batch_for_unknown_material_fails_fast() {
    let fx = fixture();
    let result =
        fx.service.run_classification(BatchTarget::Material("missing".to_string()), TOPSIS).await;
    assert!(matches!(result, Err(ClassificationError::NotFound(_))));
}

#[tokio::test]
async fn empty_course_report_lists_every_level() {
    let fx = fixture();
    let report = fx.service.course_report(COURSE, TOPSIS).await.expect("report");
    assert_eq!(report.total_students(), 0);
    assert!(report.level_distribution.values().all(|count| *count == 0));
    assert!(report.average_score.is_none());
}
