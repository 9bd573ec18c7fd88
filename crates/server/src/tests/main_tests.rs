use super::*;
use axum::{body, body::Body, http::Request};
use shared::domain::TimerStatus;
use tower::ServiceExt;

async fn test_app() -> (Router, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext::new(storage.clone());
    let app = build_router(Arc::new(AppState::new(api)));
    (app, storage)
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn post_json(uri: &str, value: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(value.to_string()))
        .expect("request")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn create_then_list_returns_original_record_shape() {
    let (app, _storage) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/annotators",
            serde_json::json!({ "name": "Alice" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let created: serde_json::Value = json_body(response).await;
    assert_eq!(created["name"], "Alice");
    assert!(created["start_time"].is_null());
    assert!(created["id"].is_i64());

    let request = Request::get("/api/annotators")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<Annotator> = json_body(response).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Alice");
    assert!(listed[0].start_time.is_none());
}

#[tokio::test]
async fn blank_name_is_rejected_with_validation_error() {
    let (app, storage) = test_app().await;
    let response = app
        .oneshot(post_json("/api/annotators", serde_json::json!({ "name": "  " })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(storage.list_annotators().await.expect("list").is_empty());
}

#[tokio::test]
async fn start_and_reset_routes_update_start_time() {
    let (app, storage) = test_app().await;
    let alice = storage.create_annotator("Alice").await.expect("create");

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/annotators/start",
            serde_json::json!({ "id": alice.id.0 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let started: Annotator = json_body(response).await;
    assert!(started.start_time.is_some());

    let request = Request::get("/api/annotators/timers")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let timers: serde_json::Value = json_body(response).await;
    assert_eq!(timers[0]["status"], "on_time");
    let remaining = timers[0]["remainingTime"].as_str().expect("remaining");
    assert!(remaining.starts_with("23:59") || remaining == "24:00:00");

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/annotators/reset",
            serde_json::json!({ "id": alice.id.0 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let reset: Annotator = json_body(response).await;
    assert!(reset.start_time.is_none());

    let request = Request::get("/api/annotators/timers")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    let timers: Vec<AnnotatorTimer> = json_body(response).await;
    assert_eq!(timers[0].status, TimerStatus::Available);
    assert_eq!(timers[0].remaining_time, "");
}

#[tokio::test]
async fn start_unknown_id_is_not_found() {
    let (app, _storage) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/annotators/start",
            serde_json::json!({ "id": 404 }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn second_delete_is_not_found() {
    let (app, storage) = test_app().await;
    let alice = storage.create_annotator("Alice").await.expect("create");
    let uri = format!("/api/annotators?id={}", alice.id.0);

    let request = Request::delete(uri.as_str())
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let ack: DeleteAnnotatorResponse = json_body(response).await;
    assert!(ack.success);

    let request = Request::delete(uri.as_str())
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (app, storage) = test_app().await;
    let name = "x".repeat(MAX_REQUEST_BODY_BYTES + 1);
    let response = app
        .oneshot(post_json("/api/annotators", serde_json::json!({ "name": name })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(storage.list_annotators().await.expect("list").is_empty());
}

async fn assert_validation_error(response: axum::response::Response) {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: serde_json::Value = json_body(response).await;
    assert_eq!(err["code"], "validation");
    assert!(err["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn create_without_name_field_is_json_validation_error() {
    let (app, storage) = test_app().await;
    let response = app
        .oneshot(post_json("/api/annotators", serde_json::json!({})))
        .await
        .expect("response");
    assert_validation_error(response).await;
    assert!(storage.list_annotators().await.expect("list").is_empty());
}

#[tokio::test]
async fn delete_without_id_is_json_validation_error() {
    let (app, _storage) = test_app().await;
    let request = Request::delete("/api/annotators")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_validation_error(response).await;
}

#[tokio::test]
async fn start_with_string_id_is_json_validation_error() {
    let (app, storage) = test_app().await;
    let alice = storage.create_annotator("Alice").await.expect("create");
    let response = app
        .oneshot(post_json(
            "/api/annotators/start",
            serde_json::json!({ "id": alice.id.0.to_string() }),
        ))
        .await
        .expect("response");
    assert_validation_error(response).await;

    let unchanged = storage
        .get_annotator(alice.id)
        .await
        .expect("get")
        .expect("exists");
    assert!(unchanged.start_time.is_none());
}

#[tokio::test]
async fn reset_with_non_json_body_is_json_validation_error() {
    let (app, _storage) = test_app().await;
    let request = Request::post("/api/annotators/reset")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_validation_error(response).await;
}

#[test]
fn rejections_keep_payload_too_large_status() {
    let (status, Json(err)) = rejected(StatusCode::PAYLOAD_TOO_LARGE, "too big".into());
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(err.code, ErrorCode::Validation);

    let (status, _) = rejected(StatusCode::UNPROCESSABLE_ENTITY, "missing field".into());
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn error_codes_map_to_http_statuses() {
    assert_eq!(
        http_error(ApiError::validation("bad")).0,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        http_error(ApiError::not_found("missing")).0,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        http_error(ApiError::storage("down")).0,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
