//!
//! timecard HTTP server
//! --------------------
//! Axum boundary over the core components: account signup/login, the
//! work-interval record lifecycle and the admin query endpoints. Handlers
//! validate input, call into the injected component values held in `AppState`
//! and translate `AppError` kinds to status codes. The server owns the store
//! lifecycle: it opens the folder on startup and flushes snapshots on
//! graceful shutdown.

use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use anyhow::Context;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::AppError;
use crate::identity::{self, AccountStore, Role, TokenIssuer};
use crate::query::QueryEngine;
use crate::records::{RecordPatch, RecordStore};
use crate::storage::SharedStore;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const MIN_PASSWORD_LEN: usize = 5;

/// Shared server state injected into all handlers.
///
/// Holds the store handle plus the component values built over it; everything
/// here is cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub accounts: AccountStore,
    pub records: RecordStore,
    pub query: QueryEngine,
    pub issuer: TokenIssuer,
}

fn log_startup_folders(db_root: &str) {
    let cwd = std::env::current_dir().ok();
    let db_env = std::env::var("TIMECARD_DB_FOLDER").ok();
    let db_exists = std::path::Path::new(db_root).exists();
    info!(
        target: "startup",
        "timecard starting. Folder configuration: cwd={:?}, db_root_param={:?}, TIMECARD_DB_FOLDER_env={:?}, db_root_exists={}",
        cwd, db_root, db_env, db_exists
    );
}

/// Create the admin account named by `TIMECARD_ADMIN_EMAIL` /
/// `TIMECARD_ADMIN_PASSWORD` when both are set and the account is absent.
/// Public signup always produces employees, so this is the only bootstrap
/// path to an admin.
fn ensure_admin_from_env(accounts: &AccountStore) -> crate::error::AppResult<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("TIMECARD_ADMIN_EMAIL"),
        std::env::var("TIMECARD_ADMIN_PASSWORD"),
    ) else {
        return Ok(());
    };
    if accounts.get(&email)?.is_none() {
        accounts.create(&email, &password, Role::Admin)?;
        info!("admin account '{}' created from environment", email);
    }
    Ok(())
}

/// Start the timecard HTTP server bound to the given port over the given
/// data folder. Serves until ctrl-c, then flushes the store.
pub async fn run_with_ports(http_port: u16, db_root: &str) -> anyhow::Result<()> {
    log_startup_folders(db_root);

    let store = SharedStore::open(db_root)
        .with_context(|| format!("while opening store root: {}", db_root))?;
    let accounts = AccountStore::new(&store, identity::sha256_hex)?;
    let records = RecordStore::new(&store)?;
    let query = QueryEngine::new(records.clone());
    let issuer = TokenIssuer::from_env_or_random()?;
    ensure_admin_from_env(&accounts).context("while ensuring admin account")?;

    let state = AppState { store: store.clone(), accounts, records, query, issuer };

    let app = Router::new()
        .route("/", get(|| async { "timecard ok" }))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/employee", get(list_employees))
        .route("/employee/{email}", get(get_employee))
        .route("/document", post(create_document).get(list_documents))
        .route(
            "/document/{id}",
            get(get_document).post(update_document).delete(delete_document),
        )
        .route("/add-note/{id}", post(add_note))
        .route("/search", get(search))
        .route("/get-times", get(get_times))
        .with_state(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    store.flush().context("while flushing store on shutdown")?;
    info!("store flushed, shutdown complete");
    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    let http_port = std::env::var("TIMECARD_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(7878);
    let db_root = std::env::var("TIMECARD_DB_FOLDER").unwrap_or_else(|_| "data".to_string());
    run_with_ports(http_port, &db_root).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!("shutdown signal listener failed: {}", e);
            // Without a signal listener there is nothing to wait for; park the
            // future so the server keeps running instead of exiting at once.
            std::future::pending::<()>().await;
        }
    }
}

// ---- response helpers ----

fn reply_err(e: AppError) -> (StatusCode, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"status":"error","code": e.code_str(),"message": e.message()})))
}

fn to_json<T: serde::Serialize>(v: &T) -> serde_json::Value {
    serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
}

fn validate_total(total_time: Option<i64>) -> Result<(), AppError> {
    match total_time {
        Some(t) if t < 0 => Err(AppError::validation("bad_total_time", "total_time must be non-negative")),
        _ => Ok(()),
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc))
}

// ---- account handlers ----

#[derive(Deserialize)]
struct CredentialsPayload {
    email: String,
    password: String,
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> impl IntoResponse {
    if !EMAIL_RE.is_match(&payload.email) {
        return reply_err(AppError::validation("bad_email", "invalid email syntax"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return reply_err(AppError::validation("weak_password", "password must be at least 5 characters"));
    }
    // Public signup never grants admin, whatever the request claims.
    match state.accounts.create(&payload.email, &payload.password, Role::Employee) {
        Ok(_) => (StatusCode::OK, Json(json!({"status":"ok"}))),
        Err(e) => reply_err(e),
    }
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> impl IntoResponse {
    let outcome = state
        .accounts
        .verify(&payload.email, &payload.password)
        .and_then(|account| state.issuer.issue(&account.email, account.role));
    match outcome {
        Ok(token) => {
            info!(target: "timecard::server", "login ok email={}", payload.email);
            (StatusCode::OK, Json(json!({"status":"ok","token": token})))
        }
        Err(e) => reply_err(e),
    }
}

async fn get_employee(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> impl IntoResponse {
    match state.accounts.get(&email) {
        Ok(Some(account)) => (
            StatusCode::OK,
            // The password digest stays server-side.
            Json(json!({"status":"ok","employee": {"email": account.email, "role": account.role}})),
        ),
        Ok(None) => reply_err(AppError::not_found("not_found", "no such account")),
        Err(e) => reply_err(e),
    }
}

async fn list_employees(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(e) = identity::admin(&state.issuer, &headers) {
        return reply_err(e);
    }
    match state.accounts.list_with_work_time(&state.query) {
        Ok(listing) => (StatusCode::OK, Json(json!({"status":"ok","employees": to_json(&listing)}))),
        Err(e) => reply_err(e),
    }
}

// ---- record handlers ----

#[derive(Deserialize, Default)]
struct RecordPayload {
    finish_time: Option<DateTime<Utc>>,
    total_time: Option<i64>,
    notes: Option<String>,
}

async fn create_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RecordPayload>,
) -> impl IntoResponse {
    let caller = match identity::authenticated(&state.issuer, &headers) {
        Ok(p) => p,
        Err(e) => return reply_err(e),
    };
    if let Err(e) = validate_total(payload.total_time) {
        return reply_err(e);
    }
    let created = state.records.create(
        &caller.email,
        payload.finish_time,
        payload.total_time,
        payload.notes.as_deref().unwrap_or(""),
    );
    match created {
        Ok(record) => (StatusCode::CREATED, Json(json!({"status":"ok","id": record.id}))),
        Err(e) => reply_err(e),
    }
}

async fn get_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = identity::authenticated(&state.issuer, &headers) {
        return reply_err(e);
    }
    match state.records.get(&id) {
        Ok(Some(record)) => (StatusCode::OK, Json(json!({"status":"ok","record": to_json(&record)}))),
        Ok(None) => reply_err(AppError::not_found("not_found", "no such record")),
        Err(e) => reply_err(e),
    }
}

async fn update_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<RecordPayload>,
) -> impl IntoResponse {
    if let Err(e) = identity::authenticated(&state.issuer, &headers) {
        return reply_err(e);
    }
    if let Err(e) = validate_total(payload.total_time) {
        return reply_err(e);
    }
    let patch = RecordPatch {
        finish_time: payload.finish_time,
        total_time: payload.total_time,
        notes: payload.notes,
    };
    match state.records.update(&id, patch) {
        Ok(Some(record)) => (StatusCode::CREATED, Json(json!({"status":"ok","id": record.id}))),
        Ok(None) => reply_err(AppError::not_found("not_found", "no such record")),
        Err(e) => reply_err(e),
    }
}

#[derive(Deserialize)]
struct NotePayload {
    note: String,
}

async fn add_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<NotePayload>,
) -> impl IntoResponse {
    if let Err(e) = identity::authenticated(&state.issuer, &headers) {
        return reply_err(e);
    }
    match state.records.append_note(&id, &payload.note) {
        Ok(Some(record)) => (StatusCode::CREATED, Json(json!({"status":"ok","id": record.id}))),
        Ok(None) => reply_err(AppError::not_found("not_found", "no such record")),
        Err(e) => reply_err(e),
    }
}

async fn delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = identity::authenticated(&state.issuer, &headers) {
        return reply_err(e);
    }
    if state.records.delete(&id) {
        (StatusCode::OK, Json(json!({"status":"ok"})))
    } else {
        reply_err(AppError::not_found("not_found", "no such record"))
    }
}

async fn list_documents(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(e) = identity::authenticated(&state.issuer, &headers) {
        return reply_err(e);
    }
    match state.records.list_all() {
        Ok(records) => (StatusCode::OK, Json(json!({"status":"ok","records": to_json(&records)}))),
        Err(e) => reply_err(e),
    }
}

// ---- admin query handlers ----

#[derive(Deserialize, Default)]
struct SearchParams {
    term: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    if let Err(e) = identity::admin(&state.issuer, &headers) {
        return reply_err(e);
    }
    match state.query.search_by_note(params.term.as_deref().unwrap_or("")) {
        Ok(records) => (StatusCode::OK, Json(json!({"status":"ok","records": to_json(&records)}))),
        Err(e) => reply_err(e),
    }
}

#[derive(Deserialize, Default)]
struct TimesParams {
    start: Option<String>,
    end: Option<String>,
}

async fn get_times(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TimesParams>,
) -> impl IntoResponse {
    if let Err(e) = identity::admin(&state.issuer, &headers) {
        return reply_err(e);
    }
    let bad_range = || AppError::validation("bad_date_range", "start and end must be valid instants with start < end");
    let parsed = params
        .start
        .as_deref()
        .and_then(parse_instant)
        .zip(params.end.as_deref().and_then(parse_instant));
    let Some((start, end)) = parsed else {
        return reply_err(bad_range());
    };
    if start >= end {
        return reply_err(bad_range());
    }
    match state.query.query_by_overlap(start, end) {
        Ok(records) => (StatusCode::OK, Json(json!({"status":"ok","records": to_json(&records)}))),
        Err(e) => reply_err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern_accepts_plain_addresses() {
        assert!(EMAIL_RE.is_match("a@b.c"));
        assert!(EMAIL_RE.is_match("first.last@example.co.uk"));
        assert!(!EMAIL_RE.is_match("no-at-sign"));
        assert!(!EMAIL_RE.is_match("spaces in@local.part"));
        assert!(!EMAIL_RE.is_match("missing@tld"));
    }

    #[test]
    fn instant_parsing_is_rfc3339() {
        assert!(parse_instant("2024-01-01T10:00:00Z").is_some());
        assert!(parse_instant("2024-01-01T10:00:00+02:00").is_some());
        assert!(parse_instant("yesterday").is_none());
        assert!(parse_instant("").is_none());
    }

    #[test]
    fn negative_total_is_rejected() {
        assert!(validate_total(Some(-1)).is_err());
        assert!(validate_total(Some(0)).is_ok());
        assert!(validate_total(None).is_ok());
    }
}
