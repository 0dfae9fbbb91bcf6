use std::{io, net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat, SessionBackend};
use crate::database::{self, Database};
use crate::repository::postgres::{PgRecordRepository, PgUserRepository};
use crate::routes;
use crate::services::PasswordHasher;
use crate::session::{MemorySessionStore, PgSessionStore, SessionStore};
use crate::state::{AppState, Backends};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));
    let builder = fmt().with_env_filter(env_filter).with_target(false).with_writer(io::stdout);
    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| anyhow::anyhow!("installing log subscriber: {err}"))
}

fn postgres_backends(db: &Database, session_backend: SessionBackend) -> Backends {
    let sessions: Arc<dyn SessionStore> = match session_backend {
        SessionBackend::Memory => Arc::new(MemorySessionStore::default()),
        SessionBackend::Postgres => Arc::new(PgSessionStore::new(db.clone())),
    };
    Backends {
        users: Arc::new(PgUserRepository::new(db.clone())),
        records: Arc::new(PgRecordRepository::new(db.clone())),
        sessions,
    }
}

/// Applies the schema and exits.
pub async fn migrate(config: &Config) -> anyhow::Result<()> {
    let db = database::create_database_connection(&config.database)
        .await
        .context("connecting to the database")?;
    database::run_migrations(&db).await.context("applying migrations")?;
    db.close().await;
    Ok(())
}

/// Builds the application from `config` and serves it until a shutdown
/// signal arrives.
pub async fn serve(config: Config, migrate_first: bool) -> anyhow::Result<()> {
    let db = database::create_database_connection(&config.database)
        .await
        .context("connecting to the database")?;
    if migrate_first {
        database::run_migrations(&db).await.context("applying migrations")?;
    }

    let hasher = PasswordHasher::new(config.hash)?;
    let state = AppState::new(
        postgres_backends(&db, config.session_backend),
        hasher,
        config.cookie,
        config.rate_limit,
    );

    let cors = routes::cors_for_profile(config.profile, &config.cors_origins);
    let app = routes::build_router(state, &config.static_dir, cors);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, profile = ?config.profile, sessions = ?config.session_backend, "vitaltrack listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
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
