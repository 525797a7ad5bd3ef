use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use scholar::error::AppError;
use scholar::mailer::{Mailer, NoopMailer};
use scholar::models::NewReminderRequest;
use scholar::repository;
use scholar::services::Dispatcher;
use scholar::store;
use scholar::store::StoreGate;

/// Mailer scripted with per-attempt outcomes. Once the script runs out,
/// every further attempt succeeds.
struct ScriptedMailer {
    script: Mutex<VecDeque<bool>>,
    attempts: AtomicUsize,
    delivered: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedMailer {
    fn new(script: &[bool]) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            attempts: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
            delay: None,
        }
    }

    fn slow(script: &[bool], delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(script)
        }
    }
}

#[async_trait]
impl Mailer for ScriptedMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let ok = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or(true);
        if ok {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(AppError::Delivery("mail API unreachable".to_string()))
        }
    }
}

async fn setup_test_db() -> (SqlitePool, StoreGate) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (pool, StoreGate::default())
}

fn date(s: &str) -> NaiveDate {
    s.parse().expect("bad test date")
}

/// Adds a reminder without triggering the immediate same-day dispatch,
/// by adding it before any email preference exists.
async fn seed_unsent_reminder(
    pool: &SqlitePool,
    gate: &StoreGate,
    text: &str,
    on: NaiveDate,
) -> String {
    let reminder = repository::add_reminder(
        pool,
        gate,
        &NoopMailer,
        NewReminderRequest {
            text: text.to_string(),
            date: on,
            desc: "room 204".to_string(),
            course: "Math".to_string(),
        },
        on,
    )
    .await
    .expect("Failed to add reminder");
    assert!(!reminder.sent);
    reminder.id
}

#[tokio::test]
async fn test_fail_then_succeed_delivers_exactly_once() {
    let (pool, gate) = setup_test_db().await;
    let today = date("2026-03-09");

    let id = seed_unsent_reminder(&pool, &gate, "Quiz", today).await;
    store::save_email(&pool, "jo@example.com")
        .await
        .expect("Failed to save email");

    let mailer = Arc::new(ScriptedMailer::new(&[false, true]));
    let dispatcher = Dispatcher::new(pool.clone(), mailer.clone(), gate.clone());

    let first = dispatcher
        .run_pass_for(today)
        .await
        .expect("First pass failed");
    assert_eq!(first.due, 1);
    assert_eq!(first.delivered, 0);
    assert_eq!(first.failed, 1);

    let after_first = repository::find_reminder(&pool, &id)
        .await
        .expect("Failed to find")
        .expect("Reminder missing");
    assert!(!after_first.sent);

    let second = dispatcher
        .run_pass_for(today)
        .await
        .expect("Second pass failed");
    assert_eq!(second.delivered, 1);

    let after_second = repository::find_reminder(&pool, &id)
        .await
        .expect("Failed to find")
        .expect("Reminder missing");
    assert!(after_second.sent);

    // Exactly one successful send across both passes, and a third pass
    // attempts nothing.
    assert_eq!(mailer.delivered.load(Ordering::SeqCst), 1);
    let third = dispatcher
        .run_pass_for(today)
        .await
        .expect("Third pass failed");
    assert_eq!(third.due, 0);
    assert_eq!(mailer.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_same_day_creation_is_not_resent_by_pass() {
    let (pool, gate) = setup_test_db().await;
    let today = date("2026-03-09");
    store::save_email(&pool, "jo@example.com")
        .await
        .expect("Failed to save email");

    let mailer = Arc::new(ScriptedMailer::new(&[]));
    let reminder = repository::add_reminder(
        &pool,
        &gate,
        mailer.as_ref(),
        NewReminderRequest {
            text: "Lab report".to_string(),
            date: today,
            desc: String::new(),
            course: "Chem".to_string(),
        },
        today,
    )
    .await
    .expect("Failed to add reminder");
    assert!(reminder.sent);
    assert_eq!(mailer.delivered.load(Ordering::SeqCst), 1);

    let dispatcher = Dispatcher::new(pool.clone(), mailer.clone(), gate.clone());
    let stats = dispatcher.run_pass_for(today).await.expect("Pass failed");
    assert_eq!(stats.due, 0);
    assert_eq!(mailer.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_email_disables_dispatch() {
    let (pool, gate) = setup_test_db().await;
    let today = date("2026-03-09");
    let id = seed_unsent_reminder(&pool, &gate, "Quiz", today).await;

    let mailer = Arc::new(ScriptedMailer::new(&[]));
    let dispatcher = Dispatcher::new(pool.clone(), mailer.clone(), gate.clone());

    let stats = dispatcher.run_pass_for(today).await.expect("Pass failed");
    assert_eq!(stats.due, 0);
    assert_eq!(mailer.attempts.load(Ordering::SeqCst), 0);

    // Still unsent and still eligible: no expiry is ever applied.
    let reminder = repository::find_reminder(&pool, &id)
        .await
        .expect("Failed to find")
        .expect("Reminder missing");
    assert!(!reminder.sent);
}

#[tokio::test]
async fn test_only_todays_reminders_are_due() {
    let (pool, gate) = setup_test_db().await;
    let today = date("2026-03-09");

    seed_unsent_reminder(&pool, &gate, "Yesterday", date("2026-03-08")).await;
    seed_unsent_reminder(&pool, &gate, "Tomorrow", date("2026-03-10")).await;
    let due_id = seed_unsent_reminder(&pool, &gate, "Today", today).await;
    store::save_email(&pool, "jo@example.com")
        .await
        .expect("Failed to save email");

    let mailer = Arc::new(ScriptedMailer::new(&[]));
    let dispatcher = Dispatcher::new(pool.clone(), mailer.clone(), gate.clone());

    let stats = dispatcher.run_pass_for(today).await.expect("Pass failed");
    assert_eq!(stats.due, 1);
    assert_eq!(stats.delivered, 1);
    assert_eq!(mailer.attempts.load(Ordering::SeqCst), 1);

    let reminders = repository::list_reminders(&pool).await.expect("Failed to list");
    for reminder in reminders {
        assert_eq!(reminder.sent, reminder.id == due_id);
    }
}

#[tokio::test]
async fn test_pass_persists_sent_flags() {
    let (pool, gate) = setup_test_db().await;
    let today = date("2026-03-09");
    seed_unsent_reminder(&pool, &gate, "Quiz", today).await;
    store::save_email(&pool, "jo@example.com")
        .await
        .expect("Failed to save email");

    let mailer = Arc::new(ScriptedMailer::new(&[]));
    let dispatcher = Dispatcher::new(pool.clone(), mailer, gate.clone());
    dispatcher.run_pass_for(today).await.expect("Pass failed");

    // The durable view matches the in-memory outcome of the pass.
    let persisted = store::load_reminders(&pool).await.expect("Failed to load");
    assert_eq!(persisted.len(), 1);
    assert!(persisted[0].sent);
}

#[tokio::test]
async fn test_concurrent_passes_are_serialized() {
    let (pool, gate) = setup_test_db().await;
    let today = date("2026-03-09");
    seed_unsent_reminder(&pool, &gate, "Quiz", today).await;
    store::save_email(&pool, "jo@example.com")
        .await
        .expect("Failed to save email");

    let mailer = Arc::new(ScriptedMailer::slow(&[], Duration::from_millis(50)));
    let dispatcher = Arc::new(Dispatcher::new(pool.clone(), mailer.clone(), gate.clone()));

    // Two triggering events firing together: the second pass queues behind
    // the first and must see the persisted sent flag, not stale state.
    let a = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run_pass_for(today).await }
    });
    let b = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run_pass_for(today).await }
    });

    let first = a.await.expect("task panicked").expect("pass failed");
    let second = b.await.expect("task panicked").expect("pass failed");

    assert_eq!(first.delivered + second.delivered, 1);
    assert_eq!(mailer.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mutation_during_pass_is_not_lost() {
    let (pool, gate) = setup_test_db().await;
    let today = date("2026-03-09");
    let due_id = seed_unsent_reminder(&pool, &gate, "Quiz", today).await;
    store::save_email(&pool, "jo@example.com")
        .await
        .expect("Failed to save email");

    let mailer = Arc::new(ScriptedMailer::slow(&[], Duration::from_millis(200)));
    let dispatcher = Arc::new(Dispatcher::new(pool.clone(), mailer.clone(), gate.clone()));

    let pass = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run_pass_for(today).await }
    });

    // Land an add while the pass is awaiting the mailer: it must queue
    // behind the pass, not be erased by the pass's snapshot.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let added = repository::add_reminder(
        &pool,
        &gate,
        &NoopMailer,
        NewReminderRequest {
            text: "Essay".to_string(),
            date: date("2026-03-10"),
            desc: String::new(),
            course: "Eng".to_string(),
        },
        today,
    )
    .await
    .expect("Failed to add reminder");

    let stats = pass.await.expect("task panicked").expect("pass failed");
    assert_eq!(stats.delivered, 1);

    let persisted = store::load_reminders(&pool).await.expect("Failed to load");
    assert_eq!(persisted.len(), 2);
    assert!(persisted.iter().any(|r| r.id == added.id));
    assert!(
        persisted
            .iter()
            .find(|r| r.id == due_id)
            .expect("Due reminder missing")
            .sent
    );
}
