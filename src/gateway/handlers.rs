use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AppState, MAX_QUESTION_CHARS};
use crate::security::{client_ip, hash_ip, hash_question, user_id_from_hash};
use crate::store::{InteractionRecord, SessionRecord};
use crate::verdicts::Language;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Request / response shapes ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct DivineRequest {
    #[serde(default)]
    pub question: String,
    pub language: Option<String>,
    #[serde(rename = "clientId")]
    #[allow(dead_code)] // accepted for forward compatibility, identity is IP-derived
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct FortuneResult {
    pub id: String,
    pub text: String,
    pub language: String,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(rename = "shareText")]
    pub share_text: String,
    pub category: String,
}

#[derive(Debug, Serialize)]
pub(super) struct DivineResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<FortuneResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl DivineResponse {
    fn ok(data: FortuneResult) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        })
    }

    fn err(error: &'static str, message: &'static str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(error),
            message: Some(message),
        })
    }
}

// ── Localized copy ───────────────────────────────────────────────────

fn share_text(language: Language) -> &'static str {
    match language {
        Language::Zh => "我刚算了一卦，有点不舒服。",
        Language::En => "I just had my fortune told, and it hit too close to home.",
    }
}

fn internal_error_message(language: Language) -> &'static str {
    match language {
        Language::Zh => "命运之轮暂时卡住了，请稍后再试",
        Language::En => "The wheel of destiny is stuck, please try again later",
    }
}

fn not_found_message(language: Language) -> &'static str {
    match language {
        Language::Zh => "分享链接已失效或不存在",
        Language::En => "Share link has expired or does not exist",
    }
}

/// Derive the anonymized visitor identity for one request.
fn request_user(state: &AppState, headers: &HeaderMap, addr: SocketAddr) -> (String, String) {
    let ip = client_ip(headers, Some(&addr.ip().to_string()));
    let ip_hash = hash_ip(&ip, &state.config.privacy.ip_salt);
    (user_id_from_hash(&ip_hash), ip_hash)
}

// ── Handlers ─────────────────────────────────────────────────────────

pub(super) async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "tiekou",
        "version": VERSION,
        "status": "running",
    }))
}

pub(super) async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": VERSION,
    }))
}

pub(super) async fn handle_version() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "version": VERSION }))
}

/// POST /api/v1/divine — one reading.
pub(super) async fn handle_divine(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<DivineRequest>,
) -> Json<DivineResponse> {
    let started = Instant::now();
    let language = Language::from_tag_or(request.language.as_deref(), state.config.default_language);

    // Input normalization: trim, then silently truncate oversized questions.
    let mut question: String = request.question.trim().to_string();
    if question.chars().count() > MAX_QUESTION_CHARS {
        question = question.chars().take(MAX_QUESTION_CHARS).collect();
    }

    let (user_id, ip_hash) = request_user(&state, &headers, addr);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(100).collect::<String>());

    tracing::info!(user = %user_id, lang = %language, "divine request");

    if let Err(e) = state
        .store
        .upsert_session(&SessionRecord {
            user_id: user_id.clone(),
            ip_hash,
            user_agent,
            language: language.to_string(),
        })
        .await
    {
        tracing::warn!(error = %e, "failed to save session");
    }

    let reading = match state.agent.execute(&question, language, false).await {
        Ok(reading) => reading,
        Err(e) => {
            tracing::error!(error = %e, "divine pipeline failed");
            return DivineResponse::err("INTERNAL_ERROR", internal_error_message(language));
        }
    };

    let now = Local::now();
    let hour = chrono::Timelike::hour(&now);
    let share_id = Uuid::new_v4().simple().to_string()[..8].to_string();
    let response_time_ms = started.elapsed().as_millis() as i64;

    // The stored text is the final (perturbed) verdict: a re-run of the
    // perturbation would not reproduce it bit-for-bit. Mother verdict and
    // feature snapshot come from the reading itself; a re-read of agent
    // memory here could pick up a concurrent request's entry.
    let record = InteractionRecord {
        user_id,
        question: question.clone(),
        question_hash: hash_question(&question),
        result: reading.result.clone(),
        state: reading.state.to_string(),
        mother_verdict: reading.mother_verdict.clone(),
        features_json: serde_json::to_string(&reading.features).unwrap_or_default(),
        language: language.to_string(),
        is_night: hour >= 23 || hour < 3,
        timestamp: now,
        response_time_ms,
        share_id: share_id.clone(),
    };

    if let Err(e) = state.store.save_interaction(&record).await {
        tracing::warn!(error = %e, "failed to save interaction");
    }

    tracing::info!(share_id = %share_id, elapsed_ms = response_time_ms, "fortune generated");

    DivineResponse::ok(FortuneResult {
        id: share_id,
        text: reading.result,
        language: language.to_string(),
        timestamp: now.timestamp_millis(),
        share_text: share_text(language).to_string(),
        category: "general".to_string(),
    })
}

/// GET /api/v1/share/{share_id} — retrieve a stored reading.
pub(super) async fn handle_share(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Json<DivineResponse> {
    match state.store.interaction_by_share_id(&share_id).await {
        Ok(Some(interaction)) => {
            let language = Language::from_tag_or(
                Some(interaction.language.as_str()),
                state.config.default_language,
            );
            DivineResponse::ok(FortuneResult {
                id: share_id,
                text: interaction.result,
                language: interaction.language,
                timestamp: interaction.timestamp.timestamp_millis(),
                share_text: share_text(language).to_string(),
                category: "general".to_string(),
            })
        }
        Ok(None) => {
            tracing::warn!(share_id = %share_id, "share id not found");
            DivineResponse::err("NOT_FOUND", not_found_message(state.config.default_language))
        }
        Err(e) => {
            tracing::error!(error = %e, "share lookup failed");
            DivineResponse::err(
                "INTERNAL_ERROR",
                internal_error_message(state.config.default_language),
            )
        }
    }
}

// ── Stats ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: usize,
}

fn default_recent_limit() -> usize {
    10
}

/// Per-user query cap, matching the public API contract.
const MAX_RECENT_LIMIT: usize = 50;

/// GET /api/v1/stats/user — usage stats for the requesting visitor.
pub(super) async fn handle_user_stats(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let (user_id, _) = request_user(&state, &headers, addr);

    match state.store.user_stats(&user_id).await {
        Ok(Some(stats)) => Json(serde_json::json!({ "success": true, "data": stats })),
        Ok(None) => Json(serde_json::json!({
            "success": true,
            "data": {
                "user_id": user_id,
                "message": "No data available for this user",
            },
        })),
        Err(e) => {
            tracing::error!(error = %e, "user stats query failed");
            Json(serde_json::json!({ "success": false, "error": e.to_string() }))
        }
    }
}

/// GET /api/v1/stats/user/recent — the visitor's latest readings, newest first.
pub(super) async fn handle_user_recent(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<RecentQuery>,
) -> Json<serde_json::Value> {
    let (user_id, _) = request_user(&state, &headers, addr);
    let limit = query.limit.min(MAX_RECENT_LIMIT);

    match state.store.recent_interactions_for(&user_id, limit).await {
        Ok(interactions) => Json(serde_json::json!({ "success": true, "data": interactions })),
        Err(e) => {
            tracing::error!(error = %e, "recent interactions query failed");
            Json(serde_json::json!({ "success": false, "error": e.to_string() }))
        }
    }
}

/// GET /api/v1/stats/global — whole-system usage counters.
pub(super) async fn handle_global_stats(
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    match state.store.global_stats().await {
        Ok(stats) => Json(serde_json::json!({ "success": true, "data": stats })),
        Err(e) => {
            tracing::error!(error = %e, "global stats query failed");
            Json(serde_json::json!({ "success": false, "error": e.to_string() }))
        }
    }
}
