//! Handlers shared by every record collection.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::auth::AuthUser;
use crate::db::store::{Document, ID_FIELD};
use crate::db::{Record, Repository};
use crate::error::AppError;
use crate::ids::ObjectId;
use crate::services::{BulkMode, BulkReport, BulkSyncEngine};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedResponse {
    pub inserted_id: ObjectId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedResponse {
    pub modified_count: u64,
    pub upserted_id: Option<ObjectId>,
}

pub fn into_document(body: Value) -> Result<Document, AppError> {
    match body {
        Value::Object(doc) => Ok(doc),
        _ => Err(AppError::Validation(
            "request body must be a JSON object".to_string(),
        )),
    }
}

/// `?id=` returns one record or `null`; no id lists the collection.
pub async fn get_records<R: Record>(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<IdQuery>,
) -> Result<Response, AppError> {
    let repo = Repository::<R>::new(state.store.clone());
    match params.id {
        Some(id) => Ok(Json(repo.get(&id).await?).into_response()),
        None => Ok(Json(repo.list().await?).into_response()),
    }
}

pub async fn create_record<R: Record>(
    State(state): State<AppState>,
    _user: AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<InsertedResponse>), AppError> {
    let Json(body) = payload?;
    let doc = into_document(body)?;

    let inserted_id = Repository::<R>::new(state.store.clone()).create(doc).await?;
    Ok((StatusCode::CREATED, Json(InsertedResponse { inserted_id })))
}

/// Body is `{_id, ...fields}`; only the supplied fields are written.
pub async fn upsert_record<R: Record>(
    State(state): State<AppState>,
    _user: AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let Json(body) = payload?;
    let doc = into_document(body)?;
    let id = match doc.get(ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        _ => return Err(AppError::Validation("_id is required".to_string())),
    };

    let outcome = Repository::<R>::new(state.store.clone())
        .upsert(&id, &doc)
        .await?;
    Ok(Json(UpdatedResponse {
        modified_count: outcome.modified_count,
        upserted_id: outcome.upserted_id,
    }))
}

pub async fn bulk_insert<R: Record>(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BulkReport>, AppError> {
    run_bulk::<R>(state, user, payload, BulkMode::Insert).await
}

pub async fn bulk_upsert<R: Record>(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BulkReport>, AppError> {
    run_bulk::<R>(state, user, payload, BulkMode::Upsert).await
}

async fn run_bulk<R: Record>(
    state: AppState,
    user: AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
    mode: BulkMode,
) -> Result<Json<BulkReport>, AppError> {
    let Json(batch) = payload?;
    info!("bulk {:?} into {} requested by {}", mode, R::COLLECTION, user.email);

    let report = BulkSyncEngine::<R>::new(state.store.clone())
        .sync(batch, mode)
        .await?;
    Ok(Json(report))
}
