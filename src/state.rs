use std::sync::Arc;

use sqlx::SqlitePool;

use crate::mailer::Mailer;
use crate::services::Dispatcher;
use crate::store::StoreGate;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub mailer: Arc<dyn Mailer>,
    pub dispatcher: Arc<Dispatcher>,
    pub gate: StoreGate,
}
