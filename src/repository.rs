//! Reminder and note repositories. Every mutating operation writes the full
//! updated collection through to the store before returning, so the
//! in-memory and durable views never diverge across a single operation.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::mailer::Mailer;
use crate::models::{
    NewNoteRequest, NewReminderRequest, Note, Reminder, UpdateNoteRequest, UpdateReminderRequest,
};
use crate::services::dispatcher::{mail_body, mail_subject};
use crate::store;
use crate::store::StoreGate;

/// Creates a reminder. If an email preference is set and the reminder is
/// dated today, one synchronous dispatch attempt runs before insertion so
/// the user gets instant feedback; `sent` is true only if that attempt
/// succeeds. A failed attempt is left for the next dispatch pass.
pub async fn add_reminder(
    db: &SqlitePool,
    gate: &StoreGate,
    mailer: &dyn Mailer,
    req: NewReminderRequest,
    today: NaiveDate,
) -> Result<Reminder, AppError> {
    if req.text.is_empty() {
        return Err(AppError::Validation(
            "Please add a reminder title".to_string(),
        ));
    }

    // Held across the send so an in-flight dispatch pass cannot overwrite
    // this insertion with its stale snapshot.
    let _cycle = gate.lock().await;

    let email = store::load_email(db).await?;
    let mut sent = false;
    if !email.is_empty() && req.date == today {
        match mailer
            .send(
                &email,
                &mail_subject(&req.course, &req.text),
                &mail_body(&req.desc),
            )
            .await
        {
            Ok(()) => sent = true,
            Err(e) => warn!("immediate dispatch failed, leaving for next pass: {}", e),
        }
    }

    let reminder = Reminder {
        id: Uuid::new_v4().to_string(),
        text: req.text,
        date: req.date,
        desc: req.desc,
        course: req.course,
        sent,
    };

    let mut reminders = store::load_reminders(db).await?;
    reminders.push(reminder.clone());
    store::save_reminders(db, &reminders).await?;

    Ok(reminder)
}

/// Replaces all mutable fields of the matching reminder. `id` and `sent`
/// are preserved untouched. Returns `Ok(None)` when no reminder has the id;
/// nothing is persisted in that case.
pub async fn update_reminder(
    db: &SqlitePool,
    gate: &StoreGate,
    id: &str,
    req: UpdateReminderRequest,
) -> Result<Option<Reminder>, AppError> {
    if req.text.is_empty() {
        return Err(AppError::Validation(
            "Please add a reminder title".to_string(),
        ));
    }

    let _cycle = gate.lock().await;

    let mut reminders = store::load_reminders(db).await?;
    let Some(reminder) = reminders.iter_mut().find(|r| r.id == id) else {
        return Ok(None);
    };

    reminder.text = req.text;
    reminder.date = req.date;
    reminder.desc = req.desc;
    reminder.course = req.course;
    let updated = reminder.clone();

    store::save_reminders(db, &reminders).await?;
    Ok(Some(updated))
}

/// Removes the reminder with the given id. Deleting an unknown id is a
/// silent no-op and leaves the persisted collection untouched.
pub async fn delete_reminder(db: &SqlitePool, gate: &StoreGate, id: &str) -> Result<(), AppError> {
    let _cycle = gate.lock().await;

    let reminders = store::load_reminders(db).await?;
    let remaining: Vec<Reminder> = reminders.into_iter().filter(|r| r.id != id).collect();
    store::save_reminders(db, &remaining).await?;
    Ok(())
}

pub async fn find_reminder(db: &SqlitePool, id: &str) -> Result<Option<Reminder>, AppError> {
    let reminders = store::load_reminders(db).await?;
    Ok(reminders.into_iter().find(|r| r.id == id))
}

pub async fn list_reminders(db: &SqlitePool) -> Result<Vec<Reminder>, AppError> {
    store::load_reminders(db).await
}

/// Exact course-name match in stored order. The empty string selects
/// general reminders not tied to any course.
pub async fn list_by_course(db: &SqlitePool, course: &str) -> Result<Vec<Reminder>, AppError> {
    let reminders = store::load_reminders(db).await?;
    Ok(reminders.into_iter().filter(|r| r.course == course).collect())
}

pub async fn add_note(
    db: &SqlitePool,
    gate: &StoreGate,
    req: NewNoteRequest,
) -> Result<Note, AppError> {
    if req.title.is_empty() {
        return Err(AppError::Validation("Please add a note title".to_string()));
    }

    let _cycle = gate.lock().await;

    let note = Note {
        id: Uuid::new_v4().to_string(),
        title: req.title,
        content: req.content,
    };

    let mut notes = store::load_notes(db).await?;
    notes.push(note.clone());
    store::save_notes(db, &notes).await?;

    Ok(note)
}

pub async fn update_note(
    db: &SqlitePool,
    gate: &StoreGate,
    id: &str,
    req: UpdateNoteRequest,
) -> Result<Option<Note>, AppError> {
    if req.title.is_empty() {
        return Err(AppError::Validation("Please add a note title".to_string()));
    }

    let _cycle = gate.lock().await;

    let mut notes = store::load_notes(db).await?;
    let Some(note) = notes.iter_mut().find(|n| n.id == id) else {
        return Ok(None);
    };

    note.title = req.title;
    note.content = req.content;
    let updated = note.clone();

    store::save_notes(db, &notes).await?;
    Ok(Some(updated))
}

pub async fn delete_note(db: &SqlitePool, gate: &StoreGate, id: &str) -> Result<(), AppError> {
    let _cycle = gate.lock().await;

    let notes = store::load_notes(db).await?;
    let remaining: Vec<Note> = notes.into_iter().filter(|n| n.id != id).collect();
    store::save_notes(db, &remaining).await?;
    Ok(())
}

pub async fn list_notes(db: &SqlitePool) -> Result<Vec<Note>, AppError> {
    store::load_notes(db).await
}
