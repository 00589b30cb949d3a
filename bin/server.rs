// Kanji Tutor - Web Server
// Thin HTTP layer over the scheduling engine. Auth lives elsewhere; the
// authenticated user id arrives in the X-User-Id header.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect},
    routing::get,
    Form, Router,
};
use chrono::Local;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use kanji_tutor::{learning, testing, Entry, TutorError};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

#[derive(Serialize)]
struct QuizResponse {
    tested_entry: Entry,
    choices: Vec<Entry>,
}

#[derive(Serialize)]
struct RevealResponse {
    entry: Entry,
    answer_correct: bool,
}

#[derive(Deserialize)]
struct ConfirmForm {
    entry_id: i64,
}

#[derive(Deserialize)]
struct AnswerForm {
    tested_entry_id: i64,
    chosen_entry_id: i64,
}

#[derive(Deserialize)]
struct RevealQuery {
    #[serde(default)]
    answer_correct: bool,
}

/// Pull the authenticated user id out of the X-User-Id header.
fn user_id(headers: &HeaderMap) -> Result<i64, (StatusCode, String)> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "missing or invalid X-User-Id header".to_string(),
            )
        })
}

fn error_response(err: TutorError) -> (StatusCode, String) {
    if err.is_not_found() {
        (StatusCode::NOT_FOUND, err.to_string())
    } else {
        eprintln!("storage error: {}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /learn-kanji - Next entry to learn, or redirect to the done page
async fn learn_next(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let conn = state.db.lock().unwrap();

    match learning::select_next(&conn, user) {
        Ok(Some(entry)) => Json(ApiResponse::ok(entry)).into_response(),
        Ok(None) => Redirect::to("/learn-kanji/done").into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// POST /learn-kanji - Confirm an entry as learnt, then learn the next one
async fn confirm_learnt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ConfirmForm>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let mut conn = state.db.lock().unwrap();
    let today = Local::now().date_naive();

    match learning::confirm_learnt(&mut conn, user, form.entry_id, today) {
        Ok(()) => Redirect::to("/learn-kanji").into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// GET /learn-kanji/done
async fn learn_done() -> impl IntoResponse {
    Json(ApiResponse::ok("All entries learnt"))
}

/// GET /test-kanji - Next quiz, or redirect to the done page
async fn test_next(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let conn = state.db.lock().unwrap();
    let today = Local::now().date_naive();
    let mut rng = rand::thread_rng();

    match testing::select_next(&conn, user, today, &mut rng) {
        Ok(Some(quiz)) => Json(ApiResponse::ok(QuizResponse {
            tested_entry: quiz.tested,
            choices: quiz.choices,
        }))
        .into_response(),
        Ok(None) => Redirect::to("/test-kanji/done").into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// POST /test-kanji - Evaluate an answer, then redirect to the reveal page
async fn submit_answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AnswerForm>,
) -> impl IntoResponse {
    let user = match user_id(&headers) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let conn = state.db.lock().unwrap();
    let today = Local::now().date_naive();

    match testing::submit_answer(&conn, user, form.tested_entry_id, form.chosen_entry_id, today) {
        Ok(review) => Redirect::to(&format!(
            "/test-kanji/reveal/{}?answer_correct={}",
            review.entry.id, review.is_correct
        ))
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// GET /test-kanji/done
async fn test_done() -> impl IntoResponse {
    Json(ApiResponse::ok("Nothing due for testing"))
}

/// GET /test-kanji/reveal/:id - Show the tested entry and the answer result
async fn reveal(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
    Query(query): Query<RevealQuery>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match testing::reveal(&conn, entry_id, query.answer_correct) {
        Ok((entry, answer_correct)) => Json(ApiResponse::ok(RevealResponse {
            entry,
            answer_correct,
        }))
        .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

// ============================================================================
// Main Server
// ============================================================================

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("KANJI_TUTOR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    println!("🈸 Kanji Tutor - Web Server");

    let db_path = std::env::var("KANJI_TUTOR_DB").unwrap_or_else(|_| "kanji-tutor.db".to_string());
    let db_path = std::path::Path::new(&db_path);

    if !db_path.exists() {
        eprintln!("❌ Database not found at {:?}", db_path);
        eprintln!("   Run: kanji-tutor import <catalog.csv>");
        eprintln!("   to load the catalog first.");
        std::process::exit(1);
    }

    let conn = Connection::open(db_path).expect("Failed to open database");
    println!("✓ Database opened: {:?}", db_path);

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/learn-kanji", get(learn_next).post(confirm_learnt))
        .route("/learn-kanji/done", get(learn_done))
        .route("/test-kanji", get(test_next).post(submit_answer))
        .route("/test-kanji/done", get(test_done))
        .route("/test-kanji/reveal/:entry_id", get(reveal))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("🚀 Server running on http://localhost:3000");
    println!("   Learn: GET http://localhost:3000/learn-kanji");
    println!("   Test:  GET http://localhost:3000/test-kanji");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
