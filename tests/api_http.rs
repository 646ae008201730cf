// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use daily_facts::api::{self, AppState};
use daily_facts::cache::DailyFactCache;
use daily_facts::chat::{DisabledChat, DynChatClient, MockChat};
use daily_facts::ingest::types::{RawRecord, SourceProvider};
use daily_facts::ingest::Collector;
use daily_facts::store::{FactStore, MemoryFactStore};

const BODY_LIMIT: usize = 1024 * 1024;

struct OneFact;

#[async_trait::async_trait]
impl SourceProvider for OneFact {
    async fn fetch_facts(&self) -> anyhow::Result<Vec<RawRecord>> {
        Ok(vec![RawRecord::new(
            "Fixture",
            "Octopuses have three hearts and blue blood, and two of the hearts stop beating when they swim",
        )
        .category("biology")
        .tags(["octopus", "ocean", "animals"])
        .url("https://example.test/octopus")
        .meta("title", "Octopus")])
    }
    fn name(&self) -> &'static str {
        "Fixture"
    }
}

struct Harness {
    app: Router,
    store: Arc<MemoryFactStore>,
}

fn harness_with_chat(chat: DynChatClient) -> Harness {
    let store = Arc::new(MemoryFactStore::default());
    let collector = Arc::new(Collector::new(vec![Arc::new(OneFact)], store.clone()));
    let state = AppState {
        store: store.clone(),
        cache: Arc::new(DailyFactCache::new(Duration::from_secs(60))),
        collector,
        chat,
    };
    Harness {
        app: api::router(state),
        store,
    }
}

fn harness() -> Harness {
    harness_with_chat(Arc::new(DisabledChat))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let (status, bytes) = send(app, method, uri, body).await;
    let v = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, v)
}

fn admin_fact(content: &str, category: &str) -> Json {
    json!({
        "content": content,
        "category": category,
        "tags": ["Space", "space", "Category:Planets"],
        "urls": ["https://example.test/planets"],
        "metadata": { "difficulty": "easy", "language": "en", "keywords": "orbit sun" }
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let h = harness();
    let (status, bytes) = send(&h.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap().trim(), "OK");
}

#[tokio::test]
async fn daily_on_empty_store_is_not_found() {
    let h = harness();
    let (status, v) = send_json(&h.app, "GET", "/api/v1/facts/daily", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"], "no fact found");

    let (status, _) = send_json(&h.app, "GET", "/api/v1/facts/random", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_create_normalizes_and_get_roundtrips() {
    let h = harness();
    let (status, created) = send_json(
        &h.app,
        "POST",
        "/api/v1/facts",
        Some(admin_fact(
            "  Venus spins backwards   compared to most planets in the solar system ",
            "Category:Astronomy",
        )),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        created["content"],
        "Venus spins backwards compared to most planets in the solar system."
    );
    assert_eq!(created["category"], "Science");
    assert_eq!(created["tags"], json!(["space", "planets"]));
    assert_eq!(created["verified"], true);
    assert_eq!(created["source"], "Admin");
    assert!(created["score"].as_f64().unwrap() >= 0.7, "admin facts are scored");

    let id = created["id"].as_str().unwrap().to_string();
    let (status, got) = send_json(&h.app, "GET", &format!("/api/v1/facts/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(got["id"], created["id"]);
}

#[tokio::test]
async fn duplicate_admin_content_conflicts() {
    let h = harness();
    let body = admin_fact("Saturn is so light that it would float in a bathtub big enough to hold it.", "Space");
    let (s1, _) = send_json(&h.app, "POST", "/api/v1/facts", Some(body.clone())).await;
    let (s2, _) = send_json(&h.app, "POST", "/api/v1/facts", Some(body)).await;
    assert_eq!(s1, StatusCode::CREATED);
    assert_eq!(s2, StatusCode::CONFLICT);
}

#[tokio::test]
async fn admin_content_goes_through_the_validator() {
    let h = harness();
    let (status, v) = send_json(
        &h.app,
        "POST",
        "/api/v1/facts",
        Some(admin_fact("Mars is red.", "Space")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("too_short"));

    let (status, v) = send_json(
        &h.app,
        "POST",
        "/api/v1/facts",
        Some(admin_fact("The explicit details of this event are not suitable for the feed.", "History")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("banned_word"));

    let (status, _) = send_json(&h.app, "POST", "/api/v1/facts", Some(json!({ "content": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn bad_and_unknown_ids() {
    let h = harness();
    let (status, _) = send_json(&h.app, "GET", "/api/v1/facts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send_json(&h.app, "GET", &format!("/api/v1/facts/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_json(&h.app, "DELETE", &format!("/api/v1/facts/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_and_delete() {
    let h = harness();
    let (_, created) = send_json(
        &h.app,
        "POST",
        "/api/v1/facts",
        Some(admin_fact("Mars has the tallest volcano in the solar system, Olympus Mons.", "Space")),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send_json(
        &h.app,
        "PUT",
        &format!("/api/v1/facts/{id}"),
        Some(admin_fact("Olympus Mons on Mars is about 22 km high, nearly three times Everest.", "Geography")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["category"], "Geography");
    assert_eq!(updated["created_at"], created["created_at"]);
    assert_eq!(updated["publish_date"], created["publish_date"]);

    let (status, _) = send(&h.app, "DELETE", &format!("/api/v1/facts/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn daily_prefers_today_and_is_cached() {
    let h = harness();
    let (_, today) = send_json(
        &h.app,
        "POST",
        "/api/v1/facts",
        Some(admin_fact("Jupiter has the shortest day of all the planets in our solar system.", "Space")),
    )
    .await;
    let mut tomorrow = admin_fact(
        "Neptune was found by mathematics before anyone had seen it in a telescope.",
        "Space",
    );
    tomorrow["publish_date"] = json!((chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339());
    send_json(&h.app, "POST", "/api/v1/facts", Some(tomorrow)).await;

    let (status, first) = send_json(&h.app, "GET", "/api/v1/facts/daily", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], today["id"]);
    assert_eq!(first["serve_count"], 1);

    let (_, second) = send_json(&h.app, "GET", "/api/v1/facts/daily", None).await;
    assert_eq!(second["id"], today["id"], "cached pick is stable");
}

#[tokio::test]
async fn search_filters_and_limits() {
    let h = harness();
    for (c, cat) in [
        ("Mercury has no moons at all, unlike most of the other planets.", "Space"),
        ("Honey never spoils if it is stored properly in a sealed jar.", "Food"),
        ("Uranus rotates on its side relative to the plane of its orbit.", "Space"),
    ] {
        send_json(&h.app, "POST", "/api/v1/facts", Some(admin_fact(c, cat))).await;
    }

    let (status, v) = send_json(&h.app, "GET", "/api/v1/facts/search?q=honey", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v.as_array().unwrap().len(), 1);

    let (_, v) = send_json(&h.app, "GET", "/api/v1/facts/search?category=space&limit=1", None).await;
    assert_eq!(v.as_array().unwrap().len(), 1);

    let (_, v) = send_json(&h.app, "GET", "/api/v1/facts/search?tag=planets&difficulty=easy", None).await;
    assert_eq!(v.as_array().unwrap().len(), 3);

    let (_, v) = send_json(&h.app, "GET", "/api/v1/facts/search?language=fr", None).await;
    assert!(v.as_array().unwrap().is_empty());

    let (_, cats) = send_json(&h.app, "GET", "/api/v1/facts/categories", None).await;
    assert_eq!(cats, json!(["General", "Science"]));

    let (_, v) = send_json(&h.app, "GET", "/api/v1/facts/category/astronomy", None).await;
    assert_eq!(v.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_category_is_not_found_instead_of_general() {
    let h = harness();
    send_json(
        &h.app,
        "POST",
        "/api/v1/facts",
        Some(admin_fact("Honey never spoils if it is stored properly in a sealed jar.", "Food")),
    )
    .await;

    for uri in [
        "/api/v1/facts/daily?category=Dinosaurs",
        "/api/v1/facts/random?category=Dinosaurs",
        "/api/v1/facts/category/dinosaurs",
    ] {
        let (status, _) = send_json(&h.app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }

    let (status, v) = send_json(&h.app, "GET", "/api/v1/facts/search?category=Dinosaurs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(v.as_array().unwrap().is_empty());

    // an explicit General still works
    let (status, v) = send_json(&h.app, "GET", "/api/v1/facts/random?category=general", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["category"], "General");
}

#[tokio::test]
async fn admin_collect_runs_a_pass_and_reports() {
    let h = harness();
    let (status, report) = send_json(&h.app, "POST", "/admin/collect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["stored"], 1);
    assert_eq!(report["sources"][0]["source"], "Fixture");

    // same content again is a duplicate, not a second row
    let (_, report) = send_json(&h.app, "POST", "/admin/collect", None).await;
    assert_eq!(report["stored"], 0);
    assert_eq!(report["duplicates"], 1);
    assert_eq!(h.store.count().await.unwrap(), 1);

    let (_, status) = send_json(&h.app, "GET", "/admin/collector", None).await;
    assert_eq!(status["running"], false);
    assert_eq!(status["sources"], json!(["Fixture"]));
}

#[tokio::test]
async fn chat_disabled_is_503() {
    let h = harness();
    let (status, _) = send_json(
        &h.app,
        "POST",
        "/api/v1/chat",
        Some(json!({ "message": "why?" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn chat_mock_uses_fact_context() {
    let h = harness_with_chat(Arc::new(MockChat));
    let (_, created) = send_json(
        &h.app,
        "POST",
        "/api/v1/facts",
        Some(admin_fact("A day on Venus is longer than a whole year on Venus itself.", "Space")),
    )
    .await;

    let (status, v) = send_json(
        &h.app,
        "POST",
        "/api/v1/chat",
        Some(json!({
            "fact_id": created["id"],
            "message": "How is that possible?",
            "history": [{ "role": "user", "content": "hi" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["provider"], "mock");
    assert_eq!(v["fact_id"], created["id"]);
    assert!(v["reply"].as_str().unwrap().contains("Science"));

    let (status, _) = send_json(
        &h.app,
        "POST",
        "/api/v1/chat",
        Some(json!({ "message": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_stream_sends_events_then_done() {
    let h = harness_with_chat(Arc::new(MockChat));
    let (_, created) = send_json(
        &h.app,
        "POST",
        "/api/v1/facts",
        Some(admin_fact("A day on Venus is longer than a whole year on Venus itself.", "Space")),
    )
    .await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "fact_id": created["id"], "message": "How?" }).to_string(),
        ))
        .unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("data: (mock) "), "{text}");
    assert!(text.contains("data: Science: "), "{text}");
    assert!(text.trim_end().ends_with("data: [DONE]"), "{text}");
}

#[tokio::test]
async fn chat_stream_disabled_is_503() {
    let h = harness();
    let (status, _) = send_json(
        &h.app,
        "POST",
        "/api/v1/chat/stream",
        Some(json!({ "message": "why?" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
