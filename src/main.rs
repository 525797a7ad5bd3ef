use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scholar::api::router;
use scholar::mailer::{HttpMailer, MailConfig, Mailer, NoopMailer};
use scholar::services::Dispatcher;
use scholar::state::AppState;
use scholar::store::StoreGate;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "scholar=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://scholar.db?mode=rwc".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let mailer: Arc<dyn Mailer> = match MailConfig::new_from_env() {
        Ok(config) => Arc::new(HttpMailer::new(config)?),
        Err(e) => {
            warn!("no mail API configured, sends are no-ops: {}", e);
            Arc::new(NoopMailer)
        }
    };

    let gate = StoreGate::default();
    let dispatcher = Arc::new(Dispatcher::new(pool.clone(), mailer.clone(), gate.clone()));

    // Session-load pass: anything that came due while the app was closed
    // gets an attempt before the first request arrives.
    match dispatcher.run_pass().await {
        Ok(stats) => info!(
            "startup dispatch pass: {} due, {} delivered, {} failed",
            stats.due, stats.delivered, stats.failed
        ),
        Err(e) => warn!("startup dispatch pass failed: {}", e),
    }

    let state = AppState {
        db: pool.clone(),
        mailer,
        dispatcher,
        gate,
    };

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
