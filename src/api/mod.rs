pub mod records;

use std::collections::HashMap;

use axum::Json;
use axum::extract::Path;
use axum::extract::rejection::JsonRejection;
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde_json::Value;
use tracing::info;

use crate::auth::AuthUser;
use crate::db::{Filter, Record, Repository};
use crate::error::AppError;
use crate::ids::ObjectId;
use crate::models::*;
use crate::services::{IntegrityChecker, IntegrityReport};
use crate::state::AppState;

use records::{bulk_insert, bulk_upsert, create_record, get_records, into_document, upsert_record};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/classes",
            get(get_records::<Class>)
                .post(create_record::<Class>)
                .put(upsert_record::<Class>),
        )
        .route(
            "/classes/bulk",
            post(bulk_insert::<Class>).put(bulk_upsert::<Class>),
        )
        .route(
            "/class_properties",
            get(get_records::<ClassProperty>)
                .post(create_record::<ClassProperty>)
                .put(upsert_record::<ClassProperty>),
        )
        .route(
            "/class_properties/bulk",
            post(bulk_insert::<ClassProperty>).put(bulk_upsert::<ClassProperty>),
        )
        .route("/class_properties/{id}", patch(update_class_property))
        .route("/combined_classes", get(list_combined_classes))
        .route(
            "/tags",
            get(get_records::<Tag>)
                .post(create_record::<Tag>)
                .put(upsert_record::<Tag>),
        )
        .route("/settings", get(get_settings).put(put_settings))
        .route("/integrity", post(run_integrity_check))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.store.ping().await?;
    Ok(StatusCode::OK)
}

/// Reschedule-style partial update of an existing property.
async fn update_class_property(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ClassProperty>, AppError> {
    let Json(body) = payload?;
    let fields = into_document(body)?;

    let property = Repository::<ClassProperty>::new(state.store.clone())
        .update_returning(&id, &fields)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(property))
}

async fn list_combined_classes(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<CombinedClass>>, AppError> {
    let classes = Repository::<Class>::new(state.store.clone()).list().await?;
    let mut properties: HashMap<ObjectId, ClassProperty> =
        Repository::<ClassProperty>::new(state.store.clone())
            .list()
            .await?
            .into_iter()
            .filter_map(|p| p.id.map(|id| (id, p)))
            .collect();

    let combined = classes
        .into_iter()
        .map(|class| {
            let properties = class.id.and_then(|id| properties.remove(&id));
            CombinedClass { class, properties }
        })
        .collect();
    Ok(Json(combined))
}

async fn get_settings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserSettings>, AppError> {
    let settings = Repository::<UserSettings>::new(state.store.clone())
        .find_by("email", &user.email)
        .await?
        .unwrap_or_else(|| UserSettings::defaults_for(&user.email));
    Ok(Json(settings))
}

async fn put_settings(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UserSettings>, AppError> {
    let Json(body) = payload?;
    let fields = into_document(body)?;

    let repo = Repository::<UserSettings>::new(state.store.clone());
    let defaults = UserSettings::defaults_for(&user.email).to_document();
    repo.upsert_with_defaults(Filter::eq("email", user.email.as_str()), &fields, defaults)
        .await?;
    let settings = repo
        .find_by("email", &user.email)
        .await?
        .ok_or(AppError::InternalServerError)?;
    Ok(Json(settings))
}

async fn run_integrity_check(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<IntegrityReport>, AppError> {
    info!("integrity check requested by {}", user.email);
    let report = IntegrityChecker::new(state.store.clone()).run().await?;
    Ok(Json(report))
}
