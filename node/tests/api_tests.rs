use coursesync_node::config::{Mode, NodeConfig};
use coursesync_node::{AppState, TestResponse, build_router};
use coursesync_store::{ContentStore, NewContent};
use coursesync_sync::protocol::PROTOCOL_VERSION;
use coursesync_sync::{BatchSummary, VerifyResponse};
use coursesync_types::{ContentKind, LifecycleState, LocalId, SyncDirection};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

const SECRET: &str = "test-secret";

fn config(mode: Mode) -> NodeConfig {
    NodeConfig {
        mode,
        site_url: "https://master.test".into(),
        site_name: "Master".into(),
        shared_secret: SECRET.into(),
        ..NodeConfig::default()
    }
}

fn store() -> Arc<ContentStore> {
    Arc::new(ContentStore::open_in_memory().unwrap())
}

fn publish(store: &ContentStore, kind: ContentKind, slug: &str) -> LocalId {
    store
        .insert(&NewContent::new(kind, slug, slug).status(LifecycleState::Published))
        .unwrap()
        .local_id
}

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
async fn spawn_test_server(config: NodeConfig, store: Arc<ContentStore>) -> String {
    let app = build_router(AppState::new(config, store));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

fn get(url: String, key: Option<&str>) -> reqwest::RequestBuilder {
    let request = reqwest::Client::new().get(url);
    match key {
        Some(key) => request.header("X-CourseSync-Key", key),
        None => request,
    }
}

// ── Authentication ───────────────────────────────────────────────

#[tokio::test]
async fn missing_key_is_401() {
    let base = spawn_test_server(config(Mode::Master), store()).await;
    let resp = get(format!("{base}/content/courses"), None).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "missing_key");
}

#[tokio::test]
async fn wrong_key_is_403() {
    let base = spawn_test_server(config(Mode::Master), store()).await;
    let resp = get(format!("{base}/verify"), Some("nope")).send().await.unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "invalid_key");
}

#[tokio::test]
async fn unconfigured_secret_rejects_every_key() {
    let mut cfg = config(Mode::Client);
    cfg.shared_secret.clear();
    let base = spawn_test_server(cfg, store()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/receive"))
        .header("X-CourseSync-Key", "anything")
        .json(&json!({ "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn auth_is_checked_before_the_body() {
    let base = spawn_test_server(config(Mode::Client), store()).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/receive"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

// ── Content listing ──────────────────────────────────────────────

#[tokio::test]
async fn listing_pages_published_content_newest_first() {
    let s = store();
    for n in 1..=12 {
        publish(&s, ContentKind::Course, &format!("course-{n}"));
    }
    s.insert(&NewContent::new(ContentKind::Course, "Draft", "draft")).unwrap();
    let base = spawn_test_server(config(Mode::Master), s).await;

    let resp = get(format!("{base}/content/courses?page=1&per_page=5"), Some(SECRET))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total"], 12);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["page"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 5);
    assert_eq!(body["items"][0]["slug"], "course-12");

    let last: Value = get(format!("{base}/content/courses?page=3&per_page=5"), Some(SECRET))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(last["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn per_page_is_capped_and_defaulted() {
    let base = spawn_test_server(config(Mode::Master), store()).await;

    let capped: Value = get(format!("{base}/content/lessons?per_page=500"), Some(SECRET))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(capped["per_page"], 50);

    let defaulted: Value = get(format!("{base}/content/lessons"), Some(SECRET))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(defaulted["per_page"], 10);
    assert_eq!(defaulted["page"], 1);
    assert_eq!(defaulted["total"], 0);
}

#[tokio::test]
async fn unknown_kind_is_400() {
    let base = spawn_test_server(config(Mode::Master), store()).await;
    let resp = get(format!("{base}/content/certificates"), Some(SECRET)).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "invalid_content_type");
}

// ── Single item ──────────────────────────────────────────────────

#[tokio::test]
async fn single_item_by_local_or_stable_id() {
    let s = store();
    let lesson = publish(&s, ContentKind::Lesson, "intro");
    let base = spawn_test_server(config(Mode::Master), s.clone()).await;

    let resp = get(format!("{base}/content/lessons/{lesson}"), Some(SECRET)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["slug"], "intro");
    assert_eq!(body["origin_id"], lesson.get());

    let stable = body["id"].as_str().unwrap().to_string();
    assert_eq!(s.get(lesson).unwrap().unwrap().stable_id.unwrap().as_str(), stable);

    let by_stable: Value = get(format!("{base}/content/lessons/{stable}"), Some(SECRET))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_stable["id"], stable.as_str());
}

#[tokio::test]
async fn single_item_errors() {
    let s = store();
    let lesson = publish(&s, ContentKind::Lesson, "intro");
    let base = spawn_test_server(config(Mode::Master), s).await;

    let missing = get(format!("{base}/content/lessons/9999"), Some(SECRET)).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let mismatch = get(format!("{base}/content/quizzes/{lesson}"), Some(SECRET)).send().await.unwrap();
    assert_eq!(mismatch.status(), 400);
}

// ── Verify ───────────────────────────────────────────────────────

#[tokio::test]
async fn verify_registers_the_calling_client() {
    let s = store();
    let base = spawn_test_server(config(Mode::Master), s.clone()).await;

    let resp = get(format!("{base}/verify"), Some(SECRET))
        .header("X-CourseSync-Client-URL", "https://client.test")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: VerifyResponse = resp.json().await.unwrap();
    assert!(body.success);
    assert_eq!(body.site_url, "https://master.test");
    assert_eq!(body.site_name, "Master");
    assert_eq!(body.version, PROTOCOL_VERSION);

    let client = s.client("https://client.test").unwrap().unwrap();
    assert_eq!(client.display_name, "https://client.test");
    assert!(client.push_secret.is_none());

    get(format!("{base}/verify"), Some(SECRET))
        .header("X-CourseSync-Client-URL", "https://client.test")
        .header("X-CourseSync-Client-Name", "Client Academy")
        .send()
        .await
        .unwrap();
    let clients = s.list_clients().unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].display_name, "Client Academy");
}

#[tokio::test]
async fn verify_without_client_header_registers_nothing() {
    let s = store();
    let base = spawn_test_server(config(Mode::Master), s.clone()).await;
    let resp = get(format!("{base}/verify"), Some(SECRET)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(s.list_clients().unwrap().is_empty());
}

// ── Liveness probe ───────────────────────────────────────────────

#[tokio::test]
async fn test_endpoint_is_rate_limited() {
    let base = spawn_test_server(config(Mode::Master), store()).await;
    for _ in 0..10 {
        let resp = reqwest::get(format!("{base}/test")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: TestResponse = resp.json().await.unwrap();
        assert_eq!(body.status, "success");
    }
    let resp = reqwest::get(format!("{base}/test")).await.unwrap();
    assert_eq!(resp.status(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "rate_limit_exceeded");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let base = spawn_test_server(config(Mode::Master), store()).await;
    let resp = reqwest::get(format!("{base}/api/v1/identity")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

// ── Receive ──────────────────────────────────────────────────────

#[tokio::test]
async fn receive_applies_items_and_counts_failures() {
    let s = store();
    let base = spawn_test_server(config(Mode::Client), s.clone()).await;

    let batch = json!({
        "items": [
            { "type": "courses", "data": { "id": "c-1", "title": "Course", "slug": "course" } },
            { "type": "quizzes", "data": { "id": "q-1", "title": "Quiz without slug" } },
            { "type": "lessons", "data": { "id": "l-1", "title": "Lesson", "slug": "lesson", "parent": "c-1" } }
        ]
    });
    let resp = reqwest::Client::new()
        .post(format!("{base}/receive"))
        .header("X-CourseSync-Key", SECRET)
        .json(&batch)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let summary: BatchSummary = resp.json().await.unwrap();
    assert!(summary.success);
    assert_eq!((summary.synced, summary.skipped, summary.errors), (2, 0, 1));
    assert_eq!(s.count(ContentKind::Quiz, false).unwrap(), 0);

    let lesson = s.find_by_slug(ContentKind::Lesson, "lesson").unwrap().unwrap();
    let course = s.find_by_slug(ContentKind::Course, "course").unwrap().unwrap();
    assert_eq!(lesson.parent_id, Some(course.local_id));
    assert!(lesson.is_published());
}

#[tokio::test]
async fn malformed_entries_fail_alone() {
    let s = store();
    let base = spawn_test_server(config(Mode::Client), s.clone()).await;

    let batch = json!({
        "items": [
            { "type": "courses", "data": { "id": "c-1", "title": "Course", "slug": "course" } },
            { "type": 5, "data": {} },
            "oops",
            { "type": "lessons", "data": "not an object" }
        ]
    });
    let resp = reqwest::Client::new()
        .post(format!("{base}/receive"))
        .header("X-CourseSync-Key", SECRET)
        .json(&batch)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let summary: BatchSummary = resp.json().await.unwrap();
    assert_eq!((summary.synced, summary.errors), (1, 3));
    assert_eq!(summary.details.len(), 4);
    assert!(s.find_by_slug(ContentKind::Course, "course").unwrap().is_some());
}

#[tokio::test]
async fn replicated_writes_are_not_reported_as_local_edits() {
    let s = store();
    let base = spawn_test_server(config(Mode::Master), s.clone()).await;

    reqwest::Client::new()
        .post(format!("{base}/receive"))
        .header("X-CourseSync-Key", SECRET)
        .json(&json!({
            "items": [ { "type": "topics", "data": { "id": "t-1", "title": "Topic", "slug": "topic" } } ]
        }))
        .send()
        .await
        .unwrap();
    let logs = s.recent_logs(10).unwrap();
    assert!(logs.iter().all(|l| l.direction != SyncDirection::Update));

    publish(&s, ContentKind::Topic, "local-edit");
    let logs = s.recent_logs(10).unwrap();
    assert_eq!(logs[0].direction, SyncDirection::Update);
    assert_eq!(logs[0].message, "Content updated: local-edit");
}
