use std::sync::Arc;

use stockledger_api::{
    app_router,
    config::AppConfig,
    db,
    events::{process_events, EventSender},
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Harness for tests backed by an in-memory SQLite database. The pool is
/// pinned to a single connection because each pooled connection to
/// `sqlite::memory:` would otherwise see its own empty database.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");

        let (tx, rx) = mpsc::channel(100);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(process_events(rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        Self {
            state,
            _event_task: event_task,
        }
    }

    pub fn router(&self) -> axum::Router {
        app_router(self.state.clone())
    }

    /// Provision a tracked item and seed it with `quantity` on hand.
    pub async fn seed_item(&self, quantity: i32, threshold: i32) -> Uuid {
        let product_id = Uuid::new_v4();
        self.state
            .inventory
            .create_item(
                product_id,
                None,
                format!("SKU-{}", &product_id.to_string()[..8]),
                threshold,
                true,
                None,
            )
            .await
            .expect("create item");
        if quantity > 0 {
            self.state
                .inventory
                .add_stock(product_id, quantity, None, "Seed", None, None)
                .await
                .expect("seed stock");
        }
        product_id
    }
}
