use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use usage_analytics::{export_csv, export_filename, UsageSummary};
use usage_core::record::IntakeForm;

// ── Health ──────────────────────────────────────────────────────────────

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ── Tracking ────────────────────────────────────────────────────────────
//
// Called by the chatbot backend as lifecycle events occur. Tracking never
// fails the caller: store problems are logged and swallowed downstream, so
// every handler answers 200.

pub fn track_routes() -> Router<AppState> {
    Router::new()
        .route("/track/session-start", post(track_session_start))
        .route("/track/intake", post(track_intake))
        .route("/track/message", post(track_message))
        .route("/track/trials-found", post(track_trials_found))
        .route("/track/session-end", post(track_session_end))
}

#[derive(Debug, Deserialize)]
struct SessionStartRequest {
    user_id: String,
    /// Optional explicit start time; "now" when omitted.
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IntakeRequest {
    user_id: String,
    #[serde(flatten)]
    form: IntakeForm,
}

#[derive(Debug, Deserialize)]
struct UserRequest {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct TrialsFoundRequest {
    user_id: String,
    count: u64,
}

async fn track_session_start(
    State(state): State<AppState>,
    Json(req): Json<SessionStartRequest>,
) -> impl IntoResponse {
    let mut tracker = state.tracker.write().await;
    match req.timestamp {
        Some(timestamp) => tracker.start_session_at(&req.user_id, timestamp).await,
        None => tracker.start_session(&req.user_id).await,
    }
    tracked()
}

async fn track_intake(
    State(state): State<AppState>,
    Json(req): Json<IntakeRequest>,
) -> impl IntoResponse {
    state
        .tracker
        .write()
        .await
        .record_intake(&req.user_id, &req.form)
        .await;
    tracked()
}

async fn track_message(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    state.tracker.write().await.record_message(&req.user_id).await;
    tracked()
}

async fn track_trials_found(
    State(state): State<AppState>,
    Json(req): Json<TrialsFoundRequest>,
) -> impl IntoResponse {
    state
        .tracker
        .write()
        .await
        .record_trials_found(&req.user_id, req.count)
        .await;
    tracked()
}

async fn track_session_end(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    state.tracker.write().await.end_session(&req.user_id).await;
    tracked()
}

fn tracked() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

// ── Admin ───────────────────────────────────────────────────────────────

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats_summary))
        .route("/admin/export-csv", get(export_stats_csv))
        .route("/admin/clear-stats", post(clear_stats))
}

/// Summary statistics for the admin dashboard.
async fn stats_summary(State(state): State<AppState>) -> impl IntoResponse {
    let records = state.tracker.read().await.all_records().await;
    Json(UsageSummary::from_records(&records))
}

/// CSV download of the full record set, for spreadsheet import.
async fn export_stats_csv(State(state): State<AppState>) -> impl IntoResponse {
    let records = state.tracker.read().await.all_records().await;
    let body = export_csv(&records);
    let disposition = format!("attachment; filename={}", export_filename(Utc::now()));
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}

/// Delete all collected statistics. This is irreversible.
async fn clear_stats(State(state): State<AppState>) -> impl IntoResponse {
    state.tracker.write().await.clear().await;
    Json(serde_json::json!({
        "status": "success",
        "message": "All usage statistics cleared",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
