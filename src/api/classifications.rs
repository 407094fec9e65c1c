use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::classification::{
    ClassificationResponse, LatestQuery, MethodQuery, RunRequest,
};
use crate::services::classification::batch::{BatchReport, BatchTarget};
use crate::services::classification::scorer::resolve_method;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/materials/:material_id/students/:student_id", post(classify_material))
        .route("/courses/:course_id/students/:student_id", post(classify_course))
        .route("/latest", get(latest_classification))
        .route("/runs", post(run_classification))
        .route("/:result_id", get(get_classification))
}

async fn classify_material(
    State(state): State<AppState>,
    Path((material_id, student_id)): Path<(String, String)>,
    Query(query): Query<MethodQuery>,
) -> Result<(StatusCode, Json<ClassificationResponse>), ApiError> {
    let method = resolve_method(query.classification_type.as_deref())?;
    let result = state.classifier().classify_material(&student_id, &material_id, method).await?;
    Ok((StatusCode::CREATED, Json(ClassificationResponse::from_db(result))))
}

async fn classify_course(
    State(state): State<AppState>,
    Path((course_id, student_id)): Path<(String, String)>,
    Query(query): Query<MethodQuery>,
) -> Result<(StatusCode, Json<ClassificationResponse>), ApiError> {
    let method = resolve_method(query.classification_type.as_deref())?;
    let result = state.classifier().classify_course(&student_id, &course_id, method).await?;
    Ok((StatusCode::CREATED, Json(ClassificationResponse::from_db(result))))
}

async fn get_classification(
    State(state): State<AppState>,
    Path(result_id): Path<String>,
) -> Result<Json<ClassificationResponse>, ApiError> {
    let result = state.classifier().get_details(&result_id).await?;
    Ok(Json(ClassificationResponse::from_db(result)))
}

async fn latest_classification(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<ClassificationResponse>, ApiError> {
    query.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let method = resolve_method(query.classification_type.as_deref())?;

    let result = state
        .classifier()
        .latest(query.scope, &query.scope_id, &query.student_id, method)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No {} classification recorded for student {} on {}",
                query.scope.as_str(),
                query.student_id,
                query.scope_id
            ))
        })?;

    Ok(Json(ClassificationResponse::from_db(result)))
}

async fn run_classification(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<BatchReport>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let method = resolve_method(payload.classification_type.as_deref())?;

    let target = match (payload.course_id, payload.material_id) {
        (Some(course_id), None) => BatchTarget::Course(course_id),
        (None, Some(material_id)) => BatchTarget::Material(material_id),
        _ => {
            return Err(ApiError::BadRequest(
                "Exactly one of course_id or material_id is required".to_string(),
            ))
        }
    };

    let report = state.classifier().run_classification(target, method).await?;
    Ok(Json(report))
}
