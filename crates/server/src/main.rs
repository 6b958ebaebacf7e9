use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stevedore_db::store::PgProcessStore;
use stevedore_engine::config::EngineConfig;
use stevedore_engine::processor::ProcessorRegistry;
use stevedore_engine::Engine;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stevedore=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = EngineConfig::from_env();
    tracing::info!(?config, "Loaded engine configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = stevedore_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    stevedore_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    stevedore_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Engine ---
    // Concrete scan/migration processors register here as they are
    // built; an empty registry still runs the engine, with unmatched
    // items failing through the defined "no handler" path.
    let processors = ProcessorRegistry::new();

    let store = Arc::new(PgProcessStore::new(pool));
    let engine = Engine::new(config, store, processors);

    let workers = engine.start().await.expect("Failed to start engine");
    tracing::info!(workers = workers.len(), "Engine started");

    shutdown_signal().await;

    engine.shutdown();
    for handle in workers {
        let _ = handle.await;
    }
    tracing::info!("All workers drained; goodbye");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the engine
/// drains cleanly whether stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
