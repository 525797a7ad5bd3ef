use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::AppError;
use crate::mailer::Mailer;
use crate::store;
use crate::store::StoreGate;

pub fn mail_subject(course: &str, text: &str) -> String {
    format!("{} Reminder: {}", course, text)
}

pub fn mail_body(desc: &str) -> String {
    format!("Details: {}", desc)
}

/// Notification dispatcher: delivers each due reminder by email at most
/// once. A pass runs on session load and after every reminder or email
/// mutation; there is no background timer.
pub struct Dispatcher {
    db: SqlitePool,
    mailer: Arc<dyn Mailer>,
    // Shared with the repository: passes and mutations queue behind each
    // other instead of interleaving.
    gate: StoreGate,
}

#[derive(Debug, Serialize)]
pub struct PassStats {
    pub due: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl Dispatcher {
    pub fn new(db: SqlitePool, mailer: Arc<dyn Mailer>, gate: StoreGate) -> Self {
        Self { db, mailer, gate }
    }

    /// Runs one dispatch pass against the device-local calendar date.
    pub async fn run_pass(&self) -> Result<PassStats, AppError> {
        self.run_pass_for(Local::now().date_naive()).await
    }

    /// One evaluation of all reminders against the given date. Each
    /// due-and-unsent reminder gets a single delivery attempt; failures are
    /// logged and retried only on the next triggering event. The updated
    /// collection is persisted after the pass regardless of outcomes.
    pub async fn run_pass_for(&self, today: NaiveDate) -> Result<PassStats, AppError> {
        let _pass = self.gate.lock().await;

        let mut stats = PassStats {
            due: 0,
            delivered: 0,
            failed: 0,
        };

        let email = store::load_email(&self.db).await?;
        if email.is_empty() {
            return Ok(stats);
        }

        let mut reminders = store::load_reminders(&self.db).await?;
        for reminder in reminders.iter_mut() {
            if reminder.date != today || reminder.sent {
                continue;
            }
            stats.due += 1;

            match self
                .mailer
                .send(
                    &email,
                    &mail_subject(&reminder.course, &reminder.text),
                    &mail_body(&reminder.desc),
                )
                .await
            {
                Ok(()) => {
                    reminder.sent = true;
                    stats.delivered += 1;
                }
                Err(e) => {
                    warn!("failed to deliver reminder {}: {}", reminder.id, e);
                    stats.failed += 1;
                }
            }
        }

        store::save_reminders(&self.db, &reminders).await?;

        if stats.due > 0 {
            info!(
                "dispatch pass: {} due, {} delivered, {} failed",
                stats.due, stats.delivered, stats.failed
            );
        }
        Ok(stats)
    }
}
