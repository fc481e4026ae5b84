use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::error::EngineError;
use crate::models::{ClinicalArea, ReviewStatus};
use crate::study::{AreaResult, Engine};

#[derive(Clone)]
pub struct ApiState {
    pub engine: Engine,
}

pub fn app_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/study", post(record_study))
        .route("/api/simulated", post(record_simulated))
        .route("/api/reviews/:id/complete", post(complete_review))
        .route("/api/reviews", get(list_reviews))
        .route("/api/status", get(status))
        .route("/api/history", get(history))
        .route("/api/subjects", get(subjects))
        .route("/api/subjects/:id/area", post(set_subject_area))
        .route("/api/reset", post(reset))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let code = match &self {
            EngineError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::SubjectNotFound(_) | EngineError::ReviewNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            EngineError::ReviewAlreadyCompleted(_) => StatusCode::CONFLICT,
            EngineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Sql(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, self.to_string()).into_response()
    }
}

#[derive(Deserialize)]
struct StudyRequest {
    user_id: String,
    subject: String,
    correct: i64,
    total: i64,
    /// Defaults to today, for backfilling past sessions.
    date: Option<NaiveDate>,
}

async fn record_study(
    State(state): State<ApiState>,
    Json(req): Json<StudyRequest>,
) -> Result<Json<Value>, EngineError> {
    let date = req.date.unwrap_or_else(|| Utc::now().date_naive());
    let message = state
        .engine
        .record_study(&req.user_id, &req.subject, req.correct, req.total, date)
        .await?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Deserialize)]
struct SimulatedRequest {
    user_id: String,
    results: Vec<AreaResult>,
    date: Option<NaiveDate>,
}

async fn record_simulated(
    State(state): State<ApiState>,
    Json(req): Json<SimulatedRequest>,
) -> Result<Json<Value>, EngineError> {
    let date = req.date.unwrap_or_else(|| Utc::now().date_naive());
    let message = state
        .engine
        .record_simulated_exam(&req.user_id, &req.results, date)
        .await?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Deserialize)]
struct CompleteRequest {
    correct: i64,
    total: i64,
}

async fn complete_review(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<Value>, EngineError> {
    let message = state.engine.complete_review(&id, req.correct, req.total).await?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Deserialize)]
struct ReviewsQuery {
    user_id: String,
    status: Option<String>,
}

async fn list_reviews(
    State(state): State<ApiState>,
    Query(q): Query<ReviewsQuery>,
) -> Result<Response, EngineError> {
    let status = match q.status.as_deref() {
        Some("Pending") => Some(ReviewStatus::Pending),
        Some("Completed") => Some(ReviewStatus::Completed),
        Some(other) => {
            return Err(EngineError::InvalidInput(format!(
                "unknown status filter '{other}'"
            )))
        }
        None => None,
    };
    let reviews = state.engine.db().list_reviews(&q.user_id, status).await?;
    Ok(Json(reviews).into_response())
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: String,
}

async fn status(
    State(state): State<ApiState>,
    Query(q): Query<UserQuery>,
) -> Result<Response, EngineError> {
    let status = state
        .engine
        .status(&q.user_id, Utc::now().date_naive())
        .await?;
    Ok(Json(status).into_response())
}

async fn history(
    State(state): State<ApiState>,
    Query(q): Query<UserQuery>,
) -> Result<Response, EngineError> {
    let entries = state.engine.db().list_history(&q.user_id).await?;
    Ok(Json(entries).into_response())
}

async fn subjects(State(state): State<ApiState>) -> Result<Response, EngineError> {
    let subjects = state.engine.db().list_subjects().await?;
    Ok(Json(subjects).into_response())
}

#[derive(Deserialize)]
struct AreaRequest {
    area: String,
}

/// Area correction for a miscatalogued subject.
async fn set_subject_area(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<AreaRequest>,
) -> Result<Json<Value>, EngineError> {
    let area = ClinicalArea::parse(&req.area)
        .ok_or_else(|| EngineError::InvalidInput(format!("unknown clinical area '{}'", req.area)))?;
    if state.engine.db().set_subject_area(&id, area).await? {
        Ok(Json(json!({ "message": format!("Subject area set to {}.", area.as_str()) })))
    } else {
        Err(EngineError::SubjectNotFound(id))
    }
}

#[derive(Deserialize)]
struct ResetRequest {
    user_id: String,
}

async fn reset(
    State(state): State<ApiState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<Value>, EngineError> {
    let removed = state.engine.reset_progress(&req.user_id).await?;
    Ok(Json(json!({ "message": format!("Cleared {removed} history entries.") })))
}
