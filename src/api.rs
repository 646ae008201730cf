//! HTTP surface: fact serving, admin fact management, collector control and chat.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt as _};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::cache::DailyFactCache;
use crate::chat::{ChatMessage, DynChatClient};
use crate::error::{CollectionError, StoreError};
use crate::fact::{FactId, ProcessedFact, StoredFact};
use crate::ingest::normalize::{match_category, Category};
use crate::ingest::scheduler::{CollectionReport, Collector};
use crate::ingest::types::RawRecord;
use crate::ingest::validate::{Outcome, Validator};
use crate::store::{FactFilter, FactStore};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const MAX_SEARCH_LIMIT: usize = 100;
const ADMIN_SOURCE: &str = "Admin";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FactStore>,
    pub cache: Arc<DailyFactCache>,
    pub collector: Arc<Collector>,
    pub chat: DynChatClient,
}

pub fn router(state: AppState) -> Router {
    let facts = Router::new()
        .route("/", post(create_fact))
        .route("/daily", get(daily_fact))
        .route("/random", get(random_fact))
        .route("/search", get(search_facts))
        .route("/categories", get(list_categories))
        .route("/category/{category}", get(facts_by_category))
        .route(
            "/{id}",
            get(get_fact).put(update_fact).delete(delete_fact),
        );

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api/v1/facts", facts)
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/chat/stream", post(chat_stream))
        .route("/admin/collect", post(admin_collect))
        .route("/admin/collector", get(collector_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---- errors ----

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Conflict(String),
    Unavailable(String),
    Upstream(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Duplicate { .. } => ApiError::Conflict(e.to_string()),
            StoreError::Backend(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, StoreError::NotFound.to_string()),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(m) => {
                warn!(error = %m, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

fn parse_id(raw: &str) -> Result<FactId, ApiError> {
    FactId::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("invalid fact id '{raw}'")))
}

// ---- serving ----

#[derive(Debug, Default, Deserialize)]
struct CategoryQuery {
    category: Option<String>,
}

/// `Ok(None)` when no category was asked for. A label that names no category
/// is `NotFound` rather than a silent fall back to `General`.
fn category_param(raw: Option<&str>) -> Result<Option<Category>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(label) => match_category(label).map(Some).ok_or(ApiError::NotFound),
    }
}

async fn mark_served(
    state: &AppState,
    fact: StoredFact,
    kind: &'static str,
) -> Result<StoredFact, ApiError> {
    let now = Utc::now();
    state.store.record_serve(fact.id, now).await?;
    counter!("facts_served_total", "kind" => kind).increment(1);
    Ok(StoredFact {
        last_served_at: Some(now),
        serve_count: fact.serve_count + 1,
        ..fact
    })
}

/// Today's fact: cached pick, else one published today, else a random fact
/// not served in the last day, else any random fact.
async fn daily_fact(
    State(state): State<AppState>,
    Query(q): Query<CategoryQuery>,
) -> Result<Json<StoredFact>, ApiError> {
    let category = category_param(q.category.as_deref())?;
    if let Some(hit) = state.cache.get_daily_fact(category) {
        counter!("facts_served_total", "kind" => "daily").increment(1);
        return Ok(Json(hit));
    }

    let start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let end = start + chrono::Duration::days(1);
    let base = FactFilter::verified().category(category);

    let picked = match state
        .store
        .find_one(&base.clone().published_between(start, end))
        .await
    {
        Err(StoreError::NotFound) => match state
            .store
            .find_random(&base.clone().not_served_within(chrono::Duration::hours(24)))
            .await
        {
            Err(StoreError::NotFound) => state.store.find_random(&base).await?,
            other => other?,
        },
        other => other?,
    };

    let served = mark_served(&state, picked, "daily").await?;
    state.cache.set_daily_fact(category, served.clone());
    Ok(Json(served))
}

async fn random_fact(
    State(state): State<AppState>,
    Query(q): Query<CategoryQuery>,
) -> Result<Json<StoredFact>, ApiError> {
    let filter = FactFilter::verified().category(category_param(q.category.as_deref())?);
    let picked = state.store.find_random(&filter).await?;
    Ok(Json(mark_served(&state, picked, "random").await?))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    category: Option<String>,
    tag: Option<String>,
    difficulty: Option<String>,
    language: Option<String>,
    limit: Option<usize>,
    skip: Option<usize>,
}

async fn search_facts(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<StoredFact>>, ApiError> {
    // an unknown category simply matches nothing here
    let category = match category_param(q.category.as_deref()) {
        Ok(c) => c,
        Err(_) => return Ok(Json(Vec::new())),
    };
    let mut filter = FactFilter::verified().category(category);
    if let Some(text) = q.q.filter(|s| !s.trim().is_empty()) {
        filter = filter.text(text);
    }
    if let Some(tag) = q.tag.filter(|s| !s.trim().is_empty()) {
        filter = filter.tag(tag);
    }
    filter.difficulty = q.difficulty.filter(|s| !s.trim().is_empty());
    filter.language = q.language.filter(|s| !s.trim().is_empty());

    let limit = q
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let found = state
        .store
        .find_many(&filter, limit, q.skip.unwrap_or(0))
        .await?;
    Ok(Json(found))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.store.categories().await?))
}

async fn facts_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<StoredFact>>, ApiError> {
    let category = match_category(&category).ok_or(ApiError::NotFound)?;
    let filter = FactFilter::verified().category(Some(category));
    let found = state
        .store
        .find_many(&filter, DEFAULT_SEARCH_LIMIT, 0)
        .await?;
    Ok(Json(found))
}

async fn get_fact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredFact>, ApiError> {
    Ok(Json(state.store.get(parse_id(&id)?).await?))
}

// ---- admin ----

/// Admin-authored fact. Held to the same content policy as collected ones.
#[derive(Debug, Deserialize)]
pub struct FactInput {
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "related_urls")]
    pub urls: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub publish_date: Option<DateTime<Utc>>,
}

impl FactInput {
    fn into_record(self) -> RawRecord {
        let source = self
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ADMIN_SOURCE.to_string());
        let mut raw = RawRecord::new(source, self.content)
            .category(self.category)
            .tags(self.tags);
        for u in self.urls {
            let u = u.trim();
            if !u.is_empty() {
                raw = raw.url(u);
            }
        }
        raw.metadata = self.metadata;
        raw
    }

    /// Validate and score. A rejected body is a 400 with the rejection reason.
    fn into_fact(
        self,
        validator: &Validator,
        now: DateTime<Utc>,
        fallback_publish: DateTime<Utc>,
    ) -> Result<ProcessedFact, ApiError> {
        let publish_date = self.publish_date.unwrap_or(fallback_publish);
        let raw = self.into_record();
        let mut fact = match validator.process_at(&raw, now) {
            Ok(Outcome::Accepted(f)) => *f,
            Ok(Outcome::Discarded(r)) => {
                return Err(ApiError::BadRequest(format!(
                    "fact rejected: {} ({r:?})",
                    r.reason()
                )))
            }
            Err(e) => return Err(ApiError::BadRequest(e.to_string())),
        };
        fact.publish_date = publish_date;
        Ok(fact)
    }
}

async fn create_fact(
    State(state): State<AppState>,
    Json(input): Json<FactInput>,
) -> Result<(StatusCode, Json<StoredFact>), ApiError> {
    let now = Utc::now();
    let fact = input.into_fact(state.collector.validator(), now, now)?;
    let id = state.store.insert(fact).await?;
    state.cache.clear();
    info!(%id, "fact created");
    Ok((StatusCode::CREATED, Json(state.store.get(id).await?)))
}

async fn update_fact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<FactInput>,
) -> Result<Json<StoredFact>, ApiError> {
    let id = parse_id(&id)?;
    let existing = state.store.get(id).await?;
    let fact = input.into_fact(
        state.collector.validator(),
        Utc::now(),
        existing.fact.publish_date,
    )?;
    let updated = state.store.update(id, fact).await?;
    state.cache.clear();
    info!(%id, "fact updated");
    Ok(Json(updated))
}

async fn delete_fact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.store.delete(id).await?;
    state.cache.clear();
    info!(%id, "fact deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Run one pass now. Faults are part of the report, not an HTTP error.
async fn admin_collect(State(state): State<AppState>) -> Json<CollectionReport> {
    let report = match state.collector.collect_facts().await {
        Ok(r) => r,
        Err(CollectionError::Partial(r)) => r,
    };
    info!(
        target: "ingest",
        stored = report.stored,
        faults = report.fault_count(),
        "manual collection pass"
    );
    Json(report)
}

#[derive(Serialize)]
struct CollectorStatus {
    running: bool,
    sources: Vec<&'static str>,
    interval_secs: u64,
}

async fn collector_status(State(state): State<AppState>) -> Json<CollectorStatus> {
    Json(CollectorStatus {
        running: state.collector.is_running(),
        sources: state.collector.source_names(),
        interval_secs: state.collector.settings().interval.as_secs(),
    })
}

// ---- chat ----

#[derive(Debug, Deserialize)]
struct ChatReq {
    #[serde(default)]
    fact_id: Option<String>,
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatResp {
    reply: String,
    provider: &'static str,
    fact_id: Option<FactId>,
}

/// Checks shared by both chat routes. Without a `fact_id` (or with `latest`)
/// a random verified fact is the context.
async fn chat_context(state: &AppState, req: &ChatReq) -> Result<Option<StoredFact>, ApiError> {
    if !state.chat.is_enabled() {
        return Err(ApiError::Unavailable("chat is disabled".into()));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let wanted = req
        .fact_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("latest"));
    match wanted {
        Some(raw) => Ok(Some(state.store.get(parse_id(raw)?).await?)),
        None => match state.store.find_random(&FactFilter::verified()).await {
            Ok(f) => Ok(Some(f)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        },
    }
}

fn upstream(state: &AppState, e: anyhow::Error) -> ApiError {
    warn!(error = ?e, provider = state.chat.provider_name(), "chat reply failed");
    ApiError::Upstream(format!("{e:#}"))
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatReq>,
) -> Result<Json<ChatResp>, ApiError> {
    let fact = chat_context(&state, &req).await?;
    let reply = state
        .chat
        .reply(fact.as_ref(), &req.history, req.message.trim())
        .await
        .map_err(|e| upstream(&state, e))?;

    Ok(Json(ChatResp {
        reply,
        provider: state.chat.provider_name(),
        fact_id: fact.map(|f| f.id),
    }))
}

/// SSE events cannot carry carriage returns; axum splits on `\n` itself.
fn sse_text(s: &str) -> String {
    s.replace('\r', "")
}

/// Same request as `/api/v1/chat`; the reply arrives as `data:` events,
/// then a final `[DONE]`. A provider failure mid-stream becomes an `error` event.
async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatReq>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let fact = chat_context(&state, &req).await?;
    let rx = state
        .chat
        .reply_stream(fact.as_ref(), &req.history, req.message.trim())
        .await
        .map_err(|e| upstream(&state, e))?;
    counter!("chat_streams_total").increment(1);

    let stream = ReceiverStream::new(rx)
        .map(|piece| {
            Ok(match piece {
                Ok(text) => Event::default().data(sse_text(&text)),
                Err(e) => Event::default()
                    .event("error")
                    .data(sse_text(&format!("{e:#}"))),
            })
        })
        .chain(tokio_stream::once(Ok(Event::default().data("[DONE]"))));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
