use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::classification::{CourseReportResponse, HistoryResponse, MethodQuery};
use crate::services::classification::scorer::resolve_method;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:course_id/students/:student_id/history", get(student_history))
        .route("/:course_id/report", get(course_report))
}

async fn student_history(
    State(state): State<AppState>,
    Path((course_id, student_id)): Path<(String, String)>,
    Query(query): Query<MethodQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let method = resolve_method(query.classification_type.as_deref())?;
    let view = state.classifier().get_history(&student_id, &course_id, method).await?;
    Ok(Json(HistoryResponse::new(student_id, course_id, method, view)))
}

async fn course_report(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Query(query): Query<MethodQuery>,
) -> Result<Json<CourseReportResponse>, ApiError> {
    let method = resolve_method(query.classification_type.as_deref())?;
    let report = state.classifier().course_report(&course_id, method).await?;
    Ok(Json(CourseReportResponse::from_report(report)))
}
