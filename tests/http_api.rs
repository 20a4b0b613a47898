mod support;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt as _;
use serde_json::{json, Value};
use tower::ServiceExt as _;

use lms_canonical::remote::RemoteCourseApi;
use lms_canonical::routes::{self, AppState};
use lms_canonical::storage::MemoryStorage;
use lms_canonical::store::CanonicalStore;
use support::{remote_course, CourseApiStub, FakeSource};

fn app_with(store: Arc<CanonicalStore>, remote: Option<Arc<RemoteCourseApi>>) -> Router {
    routes::router(AppState { store, remote })
}

fn offline_app() -> Router {
    let store = CanonicalStore::builder()
        .storage(Arc::new(MemoryStorage::new()))
        .background_sync(false)
        .build();
    app_with(store, None)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn ids(v: &Value) -> Vec<String> {
    v.as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn path_listing_returns_published_courses() {
    let app = offline_app();
    let (status, body) = call(&app, "GET", "/api/paths/fullstack/courses", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids = ids(&body);
    assert!(ids.contains(&"html-css-basics".to_string()));
    assert!(!ids.contains(&"prog-basics".to_string()));
}

#[tokio::test]
async fn create_then_fetch_course() {
    let app = offline_app();
    let (status, created) = call(
        &app,
        "POST",
        "/api/courses",
        Some(json!({ "title": "Intro to SQL", "roles": ["Data Science"], "videoUrl": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["pathSlug"], "data-science");
    assert_eq!(created["status"], "draft");
    assert_eq!(created["videoUrl"], Value::Null);
    assert!(created.get("backendId").is_none());

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = call(&app, "GET", &format!("/api/courses/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Intro to SQL");

    let (_, listed) = call(&app, "GET", "/api/instructor/courses", None).await;
    assert_eq!(ids(&listed)[0], id);
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let app = offline_app();
    let (status, _) = call(&app, "POST", "/api/courses", Some(json!({ "title": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_course_is_not_found() {
    let app = offline_app();
    let (status, _) = call(&app, "GET", "/api/courses/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "PATCH", "/api/courses/nope", Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, "POST", "/api/courses/nope/publish", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publish_archive_modules_and_delete() {
    let app = offline_app();

    let (status, published) = call(&app, "POST", "/api/courses/react-fundamentals/publish", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");

    let modules = json!([{ "id": "r1", "title": "Components", "items": [
        { "id": "r1-1", "title": "JSX", "kind": "lesson" }
    ]}]);
    let (status, updated) = call(&app, "PUT", "/api/courses/react-fundamentals/modules", Some(modules)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["modules"][0]["items"][0]["title"], "JSX");

    let (_, archived) = call(&app, "POST", "/api/courses/react-fundamentals/archive", None).await;
    assert_eq!(archived["status"], "archived");

    let (status, _) = call(&app, "DELETE", "/api/courses/react-fundamentals", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", "/api/courses/react-fundamentals", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assignment_lifecycle() {
    let app = offline_app();
    let (status, _) = call(
        &app,
        "POST",
        "/api/assignments",
        Some(json!({ "title": "Orphan", "courseId": "missing", "type": "essay", "dueDate": "2025-07-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = call(
        &app,
        "POST",
        "/api/assignments",
        Some(json!({ "title": "Portfolio site", "courseId": "js-essentials", "type": "project", "dueDate": "2025-07-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "Assigned");
    let id = created["id"].as_str().unwrap();

    let (status, reviewed) = call(
        &app,
        "PATCH",
        &format!("/api/assignments/{id}"),
        Some(json!({ "status": "Reviewed", "aiFeedback": "Solid structure." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "Reviewed");
    assert_eq!(reviewed["aiFeedback"], "Solid structure.");

    let (_, all) = call(&app, "GET", "/api/assignments", None).await;
    assert!(ids(&all).contains(&id.to_string()));
}

#[tokio::test]
async fn quiz_put_uses_path_id() {
    let app = offline_app();
    let quiz = json!({
        "id": "ignored",
        "title": "Closures",
        "courseId": "js-essentials",
        "questionCount": 1,
        "timeLimitMinutes": 5,
        "passingScore": 80,
        "attemptLimit": 1,
        "questions": [{ "id": "q1", "prompt": "What is captured?", "options": ["values", "bindings"], "correctOption": 1 }]
    });
    let (status, saved) = call(&app, "PUT", "/api/quizzes/quiz-closures", Some(quiz.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["id"], "quiz-closures");

    let (status, fetched) = call(&app, "GET", "/api/quizzes/quiz-closures", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["questions"][0]["correctOption"], 1);

    let mut bad = quiz;
    bad["passingScore"] = json!(120);
    let (status, _) = call(&app, "PUT", "/api/quizzes/quiz-closures", Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assessments_can_be_scoped_to_a_course() {
    let app = offline_app();
    let (status, body) = call(&app, "GET", "/api/assessments?course_id=html-css-basics", None).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["assignment", "quiz"]);
}

#[tokio::test]
async fn sync_endpoint_reports_changes() {
    let source = FakeSource::new(vec![remote_course("800", "From the API", "published", &[])]);
    let store = CanonicalStore::builder()
        .storage(Arc::new(MemoryStorage::new()))
        .source(source)
        .background_sync(false)
        .build();
    let app = app_with(store, None);

    let (status, report) = call(&app, "POST", "/api/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report, json!({ "fetched": 1, "added": ["800"], "updated": [] }));
}

#[tokio::test]
async fn publish_pushes_to_remote_and_attaches_backend_id() {
    let stub = CourseApiStub::spawn(Some("[]".into()));
    let remote = Arc::new(RemoteCourseApi::with_client(reqwest::Client::new(), &stub.base_url));
    let store = CanonicalStore::builder()
        .storage(Arc::new(MemoryStorage::new()))
        .background_sync(false)
        .build();
    let app = app_with(store.clone(), Some(remote));

    let (status, published) = call(&app, "POST", "/api/courses/js-essentials/publish", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["backendId"], "501");
    assert_eq!(store.course_by_id("501").unwrap().id, "js-essentials");

    // second publish goes out as a PATCH against the backend id
    call(&app, "POST", "/api/courses/js-essentials/publish", None).await;
    let (status, _) = call(&app, "DELETE", "/api/courses/js-essentials", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let seen: Vec<_> = stub
        .recorded()
        .into_iter()
        .map(|r| format!("{} {}", r.method, r.url))
        .collect();
    assert_eq!(
        seen,
        vec![
            "POST /api/courses".to_string(),
            "PATCH /api/courses/501".to_string(),
            "DELETE /api/courses/501".to_string(),
        ]
    );
}

#[tokio::test]
async fn publish_survives_remote_outage() {
    // nothing listens on this port
    let remote = Arc::new(RemoteCourseApi::with_client(reqwest::Client::new(), "http://127.0.0.1:9"));
    let store = CanonicalStore::builder().background_sync(false).build();
    let app = app_with(store, Some(remote));

    let (status, published) = call(&app, "POST", "/api/courses/prog-basics/publish", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");
    assert!(published.get("backendId").is_none());
}
