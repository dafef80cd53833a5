use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::config::{redact_config, Config, EVENTS_POLL_MS};
use crate::dashboard::events::event_stream;
use crate::dashboard::server::DashboardState;
use crate::dashboard::views::{
    annotate_voice_lines, credential_status, watch_view, ProfileCredentials, SilentView, StatsView,
    VoiceLineView, WatchView,
};
use crate::error::NotifyError;
use crate::eventlog::{summarize_by_day, DaySummary, Entry, RangeKind};
use crate::runner::Mode;
use crate::trigger::{DryRun, TriggerOutcome, TriggerRequest};
use crate::voice::is_valid_hash;

const INDEX_HTML: &str = include_str!("index.html");
const DEFAULT_DAYS: u32 = 7;

/// Build all routes for the dashboard.
pub fn build_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        // Config
        .route("/api/config", get(config_handler))
        .route("/api/credentials", get(credentials_handler))
        // Event log
        .route("/api/history", get(history_handler))
        .route("/api/summary", get(summary_handler))
        .route("/api/watch", get(watch_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/events", get(events_handler))
        // Voice
        .route("/api/voice", get(voice_handler))
        .route("/api/voice/play/{hash}", get(voice_play_handler))
        // Dispatch
        .route("/api/test", post(test_handler))
        .route("/api/silent", get(silent_get_handler).post(silent_post_handler))
        .route("/api/trigger", get(trigger_get_handler).post(trigger_post_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler error rendered as `{"error": ...}`.
struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        let status = if e.is_not_found() {
            StatusCode::NOT_FOUND
        } else if e.is_bad_request() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Static / config
// ============================================================================

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn config_handler(State(state): State<DashboardState>) -> Json<Config> {
    Json(redact_config(&state.config))
}

async fn credentials_handler(State(state): State<DashboardState>) -> Json<Vec<ProfileCredentials>> {
    Json(credential_status(&state.config))
}

// ============================================================================
// Event log
// ============================================================================

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    days: Option<u32>,
    hours: Option<i64>,
}

async fn history_handler(
    State(state): State<DashboardState>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Vec<Entry>> {
    let entries = match q.hours {
        Some(hours) if hours > 0 => {
            let cutoff = ChronoDuration::try_hours(hours)
                .and_then(|d| Local::now().checked_sub_signed(d))
                .ok_or_else(|| ApiError::bad_request(format!("hours {hours} out of range")))?;
            state.store.entries_since(cutoff)?
        }
        _ => state.store.entries(q.days.unwrap_or(DEFAULT_DAYS))?,
    };
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days: Option<u32>,
}

async fn summary_handler(
    State(state): State<DashboardState>,
    Query(q): Query<DaysQuery>,
) -> ApiResult<Vec<DaySummary>> {
    let days = q.days.unwrap_or(DEFAULT_DAYS);
    let entries = state.store.entries(days)?;
    Ok(Json(summarize_by_day(&entries, days)))
}

#[derive(Debug, Deserialize)]
struct WatchQuery {
    date: Option<String>,
    range: Option<String>,
}

async fn watch_handler(
    State(state): State<DashboardState>,
    Query(q): Query<WatchQuery>,
) -> ApiResult<WatchView> {
    let date = match q.date.as_deref().filter(|d| !d.is_empty()) {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|_| ApiError::bad_request(format!("invalid date '{d}' (want YYYY-MM-DD)")))?,
        None => Local::now().date_naive(),
    };
    let range: RangeKind = q
        .range
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(ApiError::bad_request)?;
    let entries = state.store.entries(0)?;
    Ok(Json(watch_view(&entries, date, range)))
}

async fn stats_handler(State(state): State<DashboardState>) -> ApiResult<StatsView> {
    let entries = state.store.entries(0)?;
    Ok(Json(StatsView {
        storage: state.store.storage_kind().as_str().to_string(),
        path: state.store.path().display().to_string(),
        size_bytes: state.store.size_bytes(),
        entries: entries.len(),
        oldest: entries.first().map(|e| e.timestamp),
        newest: entries.last().map(|e| e.timestamp),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    }))
}

async fn events_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    debug!("event stream opened");
    let stream = event_stream(state.store.clone(), Duration::from_millis(EVENTS_POLL_MS));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============================================================================
// Voice
// ============================================================================

async fn voice_handler(
    State(state): State<DashboardState>,
    Query(q): Query<DaysQuery>,
) -> ApiResult<Vec<VoiceLineView>> {
    let lines = state.store.voice_lines(q.days.unwrap_or(0))?;
    Ok(Json(annotate_voice_lines(lines, &state.voice_cache)))
}

async fn voice_play_handler(
    State(state): State<DashboardState>,
    Path(hash): Path<String>,
) -> Result<Response, ApiError> {
    if !is_valid_hash(&hash) {
        return Err(ApiError::bad_request(format!("invalid voice hash '{hash}'")));
    }
    let path = state
        .voice_cache
        .lookup_hash(&hash)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, format!("no cached voice for {hash}")))?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response())
}

// ============================================================================
// Dry run
// ============================================================================

#[derive(Debug, Deserialize)]
struct TestRequest {
    profile: String,
    action: String,
    afk: Option<bool>,
    mode: Option<String>,
    hour: Option<u32>,
}

fn parse_mode(mode: Option<&str>) -> Result<Mode, ApiError> {
    mode.unwrap_or_default().parse().map_err(ApiError::bad_request)
}

async fn test_handler(
    State(state): State<DashboardState>,
    Json(req): Json<TestRequest>,
) -> ApiResult<DryRun> {
    let mode = parse_mode(req.mode.as_deref())?;
    if let Some(hour) = req.hour.filter(|h| *h > 23) {
        return Err(ApiError::bad_request(format!("hour {hour} out of range 0-23")));
    }
    let dry = state
        .notifier
        .dry_run(&req.profile, &req.action, req.afk, mode, req.hour)?;
    Ok(Json(dry))
}

// ============================================================================
// Silent mode
// ============================================================================

#[derive(Debug, Deserialize)]
struct SilentRequest {
    minutes: Option<i64>,
    #[serde(default)]
    off: bool,
}

async fn silent_get_handler(State(state): State<DashboardState>) -> Json<SilentView> {
    Json(SilentView::from_until(state.notifier.silent().silent_until()))
}

async fn silent_post_handler(
    State(state): State<DashboardState>,
    Json(req): Json<SilentRequest>,
) -> ApiResult<SilentView> {
    let silent = state.notifier.silent();
    let logging = state.config.options.log;
    match req.minutes {
        Some(m) if m < 0 => {
            return Err(ApiError::bad_request("minutes must not be negative"));
        }
        Some(m) if m > 0 && !req.off => {
            let duration = ChronoDuration::try_minutes(m)
                .ok_or_else(|| ApiError::bad_request(format!("minutes {m} too large")))?;
            let until = silent.enable(duration)?;
            if logging {
                if let Err(e) = state.store.log_silent_enable(&format!("{m}m")) {
                    warn!("failed to log silent enable: {e}");
                }
            }
            return Ok(Json(SilentView::from_until(Some(until))));
        }
        None if !req.off => {
            return Err(ApiError::bad_request("expected {\"minutes\": N} or {\"off\": true}"));
        }
        _ => {}
    }
    silent.disable()?;
    if logging {
        if let Err(e) = state.store.log_silent_disable() {
            warn!("failed to log silent disable: {e}");
        }
    }
    Ok(Json(SilentView::from_until(None)))
}

// ============================================================================
// Trigger
// ============================================================================

#[derive(Debug, Deserialize)]
struct TriggerBody {
    profile: String,
    action: String,
    mode: Option<String>,
    command: Option<String>,
    duration: Option<u64>,
    volume: Option<u8>,
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<TriggerOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn trigger_get_handler(
    State(state): State<DashboardState>,
    Query(body): Query<TriggerBody>,
) -> (StatusCode, Json<TriggerResponse>) {
    run_trigger(&state, body).await
}

async fn trigger_post_handler(
    State(state): State<DashboardState>,
    Json(body): Json<TriggerBody>,
) -> (StatusCode, Json<TriggerResponse>) {
    run_trigger(&state, body).await
}

async fn run_trigger(state: &DashboardState, body: TriggerBody) -> (StatusCode, Json<TriggerResponse>) {
    let mode = match parse_mode(body.mode.as_deref()) {
        Ok(mode) => mode,
        Err(ApiError(status, message)) => {
            return (
                status,
                Json(TriggerResponse {
                    ok: false,
                    outcome: None,
                    error: Some(message),
                }),
            )
        }
    };

    let mut req = TriggerRequest::new(&body.profile, &body.action)
        .mode(mode)
        .volume(body.volume);
    req.command = body.command;
    req.duration_secs = body.duration;

    match state.notifier.trigger(&req).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(TriggerResponse {
                ok: true,
                outcome: Some(outcome),
                error: None,
            }),
        ),
        Err(e) => {
            let ApiError(status, message) = ApiError::from(e);
            (
                status,
                Json(TriggerResponse {
                    ok: false,
                    outcome: None,
                    error: Some(message),
                }),
            )
        }
    }
}
