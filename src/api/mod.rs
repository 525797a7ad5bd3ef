use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;
use crate::models::*;
use crate::repository;
use crate::schedule;
use crate::services::PassStats;
use crate::state::AppState;
use crate::store;

#[derive(Deserialize)]
struct ReminderQueryParams {
    course: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SetEmailRequest {
    email: String,
    confirm: String,
}

#[derive(Debug, Serialize)]
struct EmailView {
    email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmailOptIn {
    enabled: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reminders", get(list_reminders).post(create_reminder))
        .route(
            "/reminders/{id}",
            get(get_reminder).put(update_reminder).delete(delete_reminder),
        )
        .route(
            "/courses",
            get(get_courses).put(set_courses).delete(reset_courses),
        )
        .route("/email", get(get_email).put(set_email))
        .route("/email-opt-in", get(get_email_opt_in).put(set_email_opt_in))
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/{id}", put(update_note).delete(delete_note))
        .route("/dispatch", post(dispatch_now))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

// Delivery failures never surface through mutating endpoints; the pass is
// best-effort and retried on the next state change.
async fn run_dispatch_pass(state: &AppState) {
    if let Err(e) = state.dispatcher.run_pass().await {
        warn!("dispatch pass failed: {}", e);
    }
}

async fn list_reminders(
    State(state): State<AppState>,
    Query(params): Query<ReminderQueryParams>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    let reminders = match params.course {
        Some(course) => repository::list_by_course(&state.db, &course).await?,
        None => repository::list_reminders(&state.db).await?,
    };
    Ok(Json(reminders))
}

async fn create_reminder(
    State(state): State<AppState>,
    Json(req): Json<NewReminderRequest>,
) -> Result<Json<Reminder>, AppError> {
    let today = Local::now().date_naive();
    let reminder =
        repository::add_reminder(&state.db, &state.gate, state.mailer.as_ref(), req, today).await?;
    run_dispatch_pass(&state).await;
    Ok(Json(reminder))
}

async fn get_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reminder>, AppError> {
    let reminder = repository::find_reminder(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(reminder))
}

async fn update_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateReminderRequest>,
) -> Result<Json<Reminder>, AppError> {
    let reminder = repository::update_reminder(&state.db, &state.gate, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    run_dispatch_pass(&state).await;
    Ok(Json(reminder))
}

async fn delete_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    repository::delete_reminder(&state.db, &state.gate, &id).await?;
    run_dispatch_pass(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_courses(State(state): State<AppState>) -> Result<Json<CourseSchedule>, AppError> {
    let courses = store::load_courses(&state.db).await?;
    let current_day = schedule::day_parity(Local::now().date_naive());
    let ordered = schedule::effective_order(&courses, current_day);
    Ok(Json(CourseSchedule {
        current_day,
        courses,
        ordered,
    }))
}

async fn set_courses(
    State(state): State<AppState>,
    Json(req): Json<SetCoursesRequest>,
) -> Result<Json<Vec<String>>, AppError> {
    let courses = schedule::set_courses(&state.db, &req.courses).await?;
    Ok(Json(courses))
}

async fn reset_courses(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    schedule::reset_courses(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_email(State(state): State<AppState>) -> Result<Json<EmailView>, AppError> {
    let email = store::load_email(&state.db).await?;
    Ok(Json(EmailView { email }))
}

/// Overwrites the delivery target. Requires two matching entries; an empty
/// matching pair clears the preference and disables dispatch.
async fn set_email(
    State(state): State<AppState>,
    Json(req): Json<SetEmailRequest>,
) -> Result<Json<EmailView>, AppError> {
    if req.email != req.confirm {
        return Err(AppError::Validation("Emails do not match".to_string()));
    }
    store::save_email(&state.db, &req.email).await?;
    run_dispatch_pass(&state).await;
    Ok(Json(EmailView { email: req.email }))
}

// Dormant opt-in toggle: persisted and served, drives nothing yet.
async fn get_email_opt_in(State(state): State<AppState>) -> Result<Json<EmailOptIn>, AppError> {
    let enabled = store::load_email_opt_in(&state.db).await?;
    Ok(Json(EmailOptIn { enabled }))
}

async fn set_email_opt_in(
    State(state): State<AppState>,
    Json(req): Json<EmailOptIn>,
) -> Result<StatusCode, AppError> {
    store::save_email_opt_in(&state.db, req.enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_notes(State(state): State<AppState>) -> Result<Json<Vec<Note>>, AppError> {
    let notes = repository::list_notes(&state.db).await?;
    Ok(Json(notes))
}

async fn create_note(
    State(state): State<AppState>,
    Json(req): Json<NewNoteRequest>,
) -> Result<Json<Note>, AppError> {
    let note = repository::add_note(&state.db, &state.gate, req).await?;
    Ok(Json(note))
}

async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<Json<Note>, AppError> {
    let note = repository::update_note(&state.db, &state.gate, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(note))
}

async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    repository::delete_note(&state.db, &state.gate, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dispatch_now(State(state): State<AppState>) -> Result<Json<PassStats>, AppError> {
    let stats = state.dispatcher.run_pass().await?;
    Ok(Json(stats))
}
