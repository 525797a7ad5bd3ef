//! Durable key/value state. Every value is a JSON document overwritten
//! wholesale on each mutation, so the last completed write for a key wins
//! and the in-memory and persisted views never diverge mid-operation.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::AppError;
use crate::models::{Note, Reminder};

/// Serializes read-modify-write cycles against the store. A mutation or a
/// dispatch pass holds the gate for its whole cycle, so a triggering event
/// that fires while a pass is awaiting the mailer queues behind it instead
/// of being overwritten by the pass's stale snapshot.
#[derive(Clone, Default)]
pub struct StoreGate(Arc<Mutex<()>>);

impl StoreGate {
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

pub const KEY_REMINDERS: &str = "reminders";
pub const KEY_COURSES: &str = "courses";
pub const KEY_EMAIL: &str = "email";
pub const KEY_EMAIL_OPT_IN: &str = "isEmailReminder";
pub const KEY_NOTES: &str = "notes";

pub async fn get_raw(db: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT value FROM store WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
}

pub async fn put_raw(db: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO store (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete_key(db: &SqlitePool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM store WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

async fn load_json<T: DeserializeOwned>(
    db: &SqlitePool,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match get_raw(db, key).await? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(default),
    }
}

async fn save_json<T: Serialize>(db: &SqlitePool, key: &str, value: &T) -> Result<(), AppError> {
    let raw = serde_json::to_string(value)?;
    put_raw(db, key, &raw).await?;
    Ok(())
}

pub async fn load_reminders(db: &SqlitePool) -> Result<Vec<Reminder>, AppError> {
    load_json(db, KEY_REMINDERS, Vec::new()).await
}

pub async fn save_reminders(db: &SqlitePool, reminders: &[Reminder]) -> Result<(), AppError> {
    save_json(db, KEY_REMINDERS, &reminders).await
}

pub async fn load_courses(db: &SqlitePool) -> Result<Vec<String>, AppError> {
    load_json(db, KEY_COURSES, Vec::new()).await
}

pub async fn save_courses(db: &SqlitePool, courses: &[String]) -> Result<(), AppError> {
    save_json(db, KEY_COURSES, &courses).await
}

pub async fn clear_courses(db: &SqlitePool) -> Result<(), AppError> {
    delete_key(db, KEY_COURSES).await?;
    Ok(())
}

/// Empty string means no delivery target is configured and dispatch is
/// disabled entirely.
pub async fn load_email(db: &SqlitePool) -> Result<String, AppError> {
    load_json(db, KEY_EMAIL, String::new()).await
}

pub async fn save_email(db: &SqlitePool, email: &str) -> Result<(), AppError> {
    save_json(db, KEY_EMAIL, &email).await
}

pub async fn load_email_opt_in(db: &SqlitePool) -> Result<bool, AppError> {
    load_json(db, KEY_EMAIL_OPT_IN, false).await
}

pub async fn save_email_opt_in(db: &SqlitePool, enabled: bool) -> Result<(), AppError> {
    save_json(db, KEY_EMAIL_OPT_IN, &enabled).await
}

pub async fn load_notes(db: &SqlitePool) -> Result<Vec<Note>, AppError> {
    load_json(db, KEY_NOTES, Vec::new()).await
}

pub async fn save_notes(db: &SqlitePool, notes: &[Note]) -> Result<(), AppError> {
    save_json(db, KEY_NOTES, &notes).await
}
