use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::types::Json;
use time::{Duration as TimeDuration, PrimitiveDateTime};
use uuid::Uuid;

use crate::api;
use crate::core::{config::Settings, state::AppState, time::primitive_now_utc};
use crate::db::models::{ClassificationHistoryEntry, ClassificationResult};
use crate::db::types::{ClassificationMethod, ClassificationScope, CognitiveLevel};
use crate::repositories::memory::{MemorySource, MemoryStore};
use crate::repositories::metric_source::MetricRecord;
use crate::services::classification::ClassificationService;

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) source: Arc<MemorySource>,
}

pub(crate) fn test_settings() -> Settings {
    test_settings_with(&[])
}

pub(crate) fn test_settings_with(overrides: &[(&str, &str)]) -> Settings {
    let mut vars: HashMap<String, String> = [
        ("CLASSIFIER_ENV", "test"),
        ("PROMETHEUS_ENABLED", "0"),
        ("UPSTREAM_TIMEOUT_MS", "500"),
        ("STORE_TIMEOUT_MS", "500"),
        ("BATCH_MAX_RETRIES", "2"),
        ("BATCH_RETRY_BACKOFF_MS", "1"),
    ]
    .iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect();
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    Settings::load_with(&|key| vars.get(key).cloned()).expect("test settings")
}

pub(crate) fn test_service(
    settings: &Settings,
    store: Arc<MemoryStore>,
    source: Arc<MemorySource>,
) -> ClassificationService {
    ClassificationService::new(source, store, settings.classification().clone())
}

pub(crate) fn setup_test_context() -> TestContext {
    let settings = test_settings();
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(MemorySource::new());
    let classifier = test_service(&settings, store.clone(), source.clone());

    let state = AppState::new(settings, classifier);
    let app = api::router::router(state.clone());

    TestContext { state, app, store, source }
}

/// A measured attempt with fixed code-metric counts and no open trial.
pub(crate) fn metric(
    question_id: &str,
    compile_count: f64,
    coding_time: f64,
    completion_status: f64,
    test_case_completion_rate: f64,
) -> MetricRecord {
    MetricRecord {
        question_id: question_id.to_string(),
        compile_count: Some(compile_count),
        coding_time: Some(coding_time),
        trial_status: Some(0.0),
        completion_status: Some(completion_status),
        variable_count: Some(4.0),
        function_count: Some(2.0),
        test_case_completion_rate: Some(test_case_completion_rate),
    }
}

pub(crate) fn strong_attempts(count: usize) -> Vec<MetricRecord> {
    (1..=count).map(|i| metric(&format!("q{i}"), 1.0, 120.0, 1.0, 1.0)).collect()
}

pub(crate) fn weak_attempts(count: usize) -> Vec<MetricRecord> {
    (1..=count)
        .map(|i| {
            let mut record = metric(&format!("q{i}"), 18.0, 3000.0, 0.0, 0.1);
            record.trial_status = Some(1.0);
            record.variable_count = Some(0.0);
            record.function_count = Some(0.0);
            record
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn material_result(
    id: &str,
    user_id: &str,
    course_id: &str,
    material_id: &str,
    score: f64,
    question_count: usize,
    completed_count: usize,
    average_test_case_completion: f64,
) -> ClassificationResult {
    ClassificationResult {
        id: id.to_string(),
        user_id: user_id.to_string(),
        course_id: course_id.to_string(),
        learning_material_id: Some(material_id.to_string()),
        scope: ClassificationScope::Material,
        classification_type: ClassificationMethod::Topsis,
        classification_level: CognitiveLevel::from_score(score),
        classification_score: score,
        raw_data: Json(serde_json::json!({
            "method": "topsis",
            "material_id": material_id,
            "summary": {
                "question_count": question_count,
                "completed_count": completed_count,
                "average_test_case_completion": average_test_case_completion,
            },
        })),
        classified_at: primitive_now_utc(),
    }
}

pub(crate) fn fixed_time(offset_seconds: i64) -> PrimitiveDateTime {
    time::macros::datetime!(2025-05-20 10:00:00) + TimeDuration::seconds(offset_seconds)
}

pub(crate) fn history_entry(offset_seconds: i64, score: f64) -> ClassificationHistoryEntry {
    ClassificationHistoryEntry {
        id: Uuid::new_v4().to_string(),
        user_id: "student".to_string(),
        course_id: "course".to_string(),
        classification_result_id: Uuid::new_v4().to_string(),
        classification_type: ClassificationMethod::Topsis,
        classification_level: CognitiveLevel::from_score(score),
        classification_score: score,
        raw_data: Json(serde_json::json!({})),
        classified_at: fixed_time(offset_seconds),
    }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
