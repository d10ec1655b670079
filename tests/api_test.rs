use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use class_scheduler::api::router;
use class_scheduler::auth::{AuthProvider, SessionAuth, StaticAuth};
use class_scheduler::db::SqliteStore;
use class_scheduler::error::AppError;
use class_scheduler::ids::new_id;
use class_scheduler::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

struct DenyAll;

#[async_trait]
impl AuthProvider for DenyAll {
    async fn require_email(&self, _headers: &HeaderMap) -> Result<String, AppError> {
        Err(AppError::Unauthorized)
    }
}

async fn setup_app_with(auth: Arc<dyn AuthProvider>) -> Router {
    let store = SqliteStore::open_in_memory()
        .await
        .expect("Failed to open in-memory store");
    router(AppState {
        store: Arc::new(store),
        auth,
    })
}

async fn setup_app() -> Router {
    setup_app_with(Arc::new(StaticAuth::new("prof@uni.edu"))).await
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = setup_app_with(Arc::new(DenyAll)).await;
    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_requests_without_session_are_unauthorized() {
    let app = setup_app_with(Arc::new(DenyAll)).await;
    let (status, body) = send(&app, Method::GET, "/classes", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized");

    let (status, _) = send(&app, Method::POST, "/classes/bulk", Some(json!([{ "title": "A" }]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // No cookie or bearer token: rejected before the session endpoint is asked.
    let session = SessionAuth::new("http://127.0.0.1:9/api/auth/session").unwrap();
    let app = setup_app_with(Arc::new(session)).await;
    let (status, _) = send(&app, Method::GET, "/settings", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_class_malformed_vs_missing() {
    let app = setup_app().await;

    let (status, body) = send(&app, Method::GET, "/classes?id=bad-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "400 Bad Request");

    let uri = format!("/classes?id={}", new_id());
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_create_and_get_class() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/classes",
        Some(json!({ "title": "Operating Systems", "course_subject": "CS", "course_num": "140" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["insertedId"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, &format!("/classes?id={id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], id);
    assert_eq!(body["title"], "Operating Systems");
    assert_eq!(body["section"], "");

    let (_, body) = send(&app, Method::GET, "/classes", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bulk_insert_skips_malformed_ids() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/classes/bulk",
        Some(json!([{ "title": "A" }, { "_id": "bad-id", "title": "B" }, { "title": "C" }])),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["insertedCount"], 2);
    let ids = body["insertedIds"].as_object().unwrap();
    assert_eq!(ids.keys().cloned().collect::<Vec<_>>(), vec!["0", "2"]);
    assert_eq!(body["results"][1]["status"], "skipped");

    let (_, listed) = send(&app, Method::GET, "/classes", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let uri = format!("/classes?id={}", ids["2"].as_str().unwrap());
    let (_, class) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(class["title"], "C");
}

#[tokio::test]
async fn test_bulk_rejects_bad_batches() {
    let app = setup_app().await;

    let (status, body) = send(&app, Method::POST, "/classes/bulk", Some(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "batch must not be empty");

    let (status, _) = send(
        &app,
        Method::POST,
        "/class_properties/bulk",
        Some(json!({ "room": "101" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/classes/bulk")
        .header("content-type", "application/json")
        .body(Body::from("[{ not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/classes/bulk",
        Some(json!([{ "_id": "nope" }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["insertedCount"], 0);
}

#[tokio::test]
async fn test_bulk_import_keeps_numeric_fields() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/classes/bulk",
        Some(json!([{ "title": "Statistics", "min_units": 3, "enrollment_cap": 120, "section": "02" }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["insertedIds"]["0"].as_str().unwrap().to_string();

    let (_, class) = send(&app, Method::GET, &format!("/classes?id={id}"), None).await;
    assert_eq!(class["min_units"], json!(3));
    assert_eq!(class["enrollment_cap"], json!(120));
    assert_eq!(class["section"], json!("02"));
    assert_eq!(class["max_units"], json!(""));
}

#[tokio::test]
async fn test_bulk_duplicate_key_is_internal_error() {
    let app = setup_app().await;
    let id = new_id().to_hex();

    let (status, _) = send(&app, Method::POST, "/classes/bulk", Some(json!([{ "_id": id }]))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, "/classes/bulk", Some(json!([{ "_id": id }]))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Database error occurred");
}

#[tokio::test]
async fn test_bulk_upsert_class_properties() {
    let app = setup_app().await;

    let (_, first) = send(
        &app,
        Method::POST,
        "/class_properties/bulk",
        Some(json!([{ "room": "101", "days": ["Mon", "Wed"] }])),
    )
    .await;
    let id = first["insertedIds"]["0"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::PUT,
        "/class_properties/bulk",
        Some(json!([{ "_id": id, "room": "202" }, { "room": "303" }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], 1);
    assert_eq!(body["insertedCount"], 1);
    assert_eq!(body["results"][0]["status"], "updated");
    assert_eq!(body["results"][1]["status"], "inserted");

    let (_, property) = send(&app, Method::GET, &format!("/class_properties?id={id}"), None).await;
    assert_eq!(property["room"], "202");
    assert_eq!(property["days"], json!(["Mon", "Wed"]));
}

#[tokio::test]
async fn test_put_class_property_upserts() {
    let app = setup_app().await;
    let id = new_id().to_hex();

    let (status, body) = send(
        &app,
        Method::PUT,
        "/class_properties",
        Some(json!({ "_id": id, "start_time": "10:00", "end_time": "11:50" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], 0);
    assert_eq!(body["upsertedId"], id);

    let (_, body) = send(
        &app,
        Method::PUT,
        "/class_properties",
        Some(json!({ "_id": id, "start_time": "13:00" })),
    )
    .await;
    assert_eq!(body["modifiedCount"], 1);
    assert_eq!(body["upsertedId"], Value::Null);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/class_properties",
        Some(json!({ "start_time": "13:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/class_properties",
        Some(json!({ "_id": "123", "start_time": "13:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_class_property() {
    let app = setup_app().await;

    let uri = format!("/class_properties/{}", new_id());
    let (status, _) = send(&app, Method::PATCH, &uri, Some(json!({ "room": "9" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, created) = send(
        &app,
        Method::POST,
        "/class_properties",
        Some(json!({ "room": "101", "start_time": "09:00" })),
    )
    .await;
    let id = created["insertedId"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/class_properties/{id}"),
        Some(json!({ "start_time": "14:00", "days": ["Fri"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start_time"], "14:00");
    assert_eq!(body["room"], "101");
    assert_eq!(body["days"], json!(["Fri"]));
}

#[tokio::test]
async fn test_combined_classes_and_integrity() {
    let app = setup_app().await;
    let paired = new_id().to_hex();

    send(&app, Method::POST, "/classes", Some(json!({ "_id": paired, "title": "Paired" }))).await;
    send(
        &app,
        Method::POST,
        "/class_properties",
        Some(json!({ "_id": paired, "room": "101" })),
    )
    .await;
    let (_, lonely) = send(&app, Method::POST, "/classes", Some(json!({ "title": "Lonely" }))).await;
    let lonely = lonely["insertedId"].as_str().unwrap().to_string();

    let (status, combined) = send(&app, Method::GET, "/combined_classes", None).await;
    assert_eq!(status, StatusCode::OK);
    let combined = combined.as_array().unwrap();
    assert_eq!(combined.len(), 2);
    for entry in combined {
        if entry["class"]["_id"] == paired {
            assert_eq!(entry["properties"]["room"], "101");
        } else {
            assert_eq!(entry["properties"], Value::Null);
        }
    }

    let (status, report) = send(&app, Method::POST, "/integrity", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["classes_missing_property"], json!([lonely]));
    assert_eq!(report["properties_missing_class"], json!([]));
}

#[tokio::test]
async fn test_tags() {
    let app = setup_app().await;
    let class_id = new_id().to_hex();

    let (status, created) = send(
        &app,
        Method::POST,
        "/tags",
        Some(json!({ "name": "Lab", "classes": [class_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tag_id = created["insertedId"].as_str().unwrap().to_string();

    let (_, tags) = send(&app, Method::GET, "/tags", None).await;
    assert_eq!(tags[0]["name"], "Lab");
    assert_eq!(tags[0]["classes"], json!([class_id]));

    let (_, body) = send(
        &app,
        Method::PUT,
        "/tags",
        Some(json!({ "_id": tag_id, "name": "Laboratory" })),
    )
    .await;
    assert_eq!(body["modifiedCount"], 1);
}

#[tokio::test]
async fn test_settings_are_scoped_to_caller() {
    let app = setup_app().await;

    let (status, defaults) = send(&app, Method::GET, "/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults["email"], "prof@uni.edu");
    assert_eq!(defaults["theme"], "light");

    let (status, saved) = send(
        &app,
        Method::PUT,
        "/settings",
        Some(json!({ "theme": "dark", "email": "intruder@uni.edu" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["email"], "prof@uni.edu");
    assert_eq!(saved["theme"], "dark");
    assert_eq!(saved["calendar_start"], "07:00");

    let (_, fetched) = send(&app, Method::GET, "/settings", None).await;
    assert_eq!(fetched["theme"], "dark");
}
