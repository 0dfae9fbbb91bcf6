use axum::{
    extract::{rejection::PathRejection, Path},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::extract::CurrentUser;
use crate::models::record::Record;
use crate::services::RecordService;
use crate::state::AppState;

/// Routes for one record kind, mounted under `/api/<table>`.
pub fn router(records: RecordService) -> Router<AppState> {
    Router::new()
        .route("/", get(list_records).post(create_record))
        .route("/:id", put(update_record).delete(delete_record))
        .layer(Extension(records))
}

async fn list_records(
    Extension(records): Extension<RecordService>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Record>>, AppError> {
    Ok(Json(records.list(user_id).await?))
}

async fn create_record(
    Extension(records): Extension<RecordService>,
    CurrentUser(user_id): CurrentUser,
    WithRejection(Json(body), _): WithRejection<Json<Value>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let id = records.create(user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "id": id }))))
}

/// An id segment that does not even decode names no record; the services
/// treat it like any other unknown id.
fn record_id(id: Result<Path<String>, PathRejection>) -> String {
    id.map(|Path(id)| id).unwrap_or_default()
}

async fn update_record(
    Extension(records): Extension<RecordService>,
    CurrentUser(user_id): CurrentUser,
    id: Result<Path<String>, PathRejection>,
    WithRejection(Json(body), _): WithRejection<Json<Value>, AppError>,
) -> Result<Json<Value>, AppError> {
    records.update(user_id, &record_id(id), &body).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn delete_record(
    Extension(records): Extension<RecordService>,
    CurrentUser(user_id): CurrentUser,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    records.delete(user_id, &record_id(id)).await?;
    Ok(Json(json!({ "ok": true })))
}
