use std::sync::Arc;

use stockledger_api::{
    app_router,
    config::{init_tracing, load_config},
    db::{establish_connection_from_app_config, run_migrations},
    events::{process_events, EventSender},
    services::reservation_sweeper::ReservationSweeper,
    AppState,
};
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config()?;
    // Production always logs structured JSON; elsewhere it is opt-in.
    init_tracing(&cfg.log_level, cfg.log_json || cfg.is_production());

    info!(environment = %cfg.environment, "starting stockledger-api");

    let db = Arc::new(establish_connection_from_app_config(&cfg).await?);
    if cfg.auto_migrate {
        run_migrations(&db).await?;
        info!("database migrations applied");
    }

    let (tx, rx) = mpsc::channel(1024);
    let event_sender = EventSender::new(tx);
    tokio::spawn(process_events(rx));

    let state = AppState::new(db.clone(), cfg.clone(), event_sender);

    let sweeper = ReservationSweeper::new(
        db.clone(),
        state.inventory.clone(),
        cfg.sweep_interval_secs,
    );
    tokio::spawn(sweeper.run());

    let addr = cfg.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
