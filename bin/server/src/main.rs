use axum_extra::extract::cookie::Key;
use passit_server::{
    app,
    auth::{
        AppState, AuthSettings, KeycloakAdmin, OidcClient,
        db::{PgSessionStore, PgUserDirectory},
    },
    bootstrap,
    config::ServerConfig,
};
use sqlx::postgres::PgPoolOptions;
use std::{future::IntoFuture, sync::Arc, time::Duration};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let sessions = Arc::new(PgSessionStore::new(db_pool.clone()));
    match sessions.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(
                deleted_sessions = count,
                "Cleaned up expired sessions on startup"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions on startup");
        }
    }

    let cleanup_store = sessions.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_store.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    let keycloak = KeycloakAdmin::new(&config.oidc, &config.keycloak_admin)
        .expect("failed to create identity provider admin client");

    tracing::info!("Discovering OIDC provider...");
    let oidc_client = Arc::new(
        OidcClient::discover(config.oidc)
            .await
            .expect("failed to discover OIDC provider"),
    );

    let settings = AuthSettings {
        frontend_url: config.frontend_url.clone(),
        session_duration: chrono::Duration::minutes(config.session.duration_minutes),
        secure_cookies: config.session.secure_cookies,
    };

    let state = AppState::new(
        Arc::new(PgUserDirectory::new(db_pool)),
        Arc::new(keycloak),
        sessions,
        oidc_client.clone(),
        oidc_client,
        settings,
        Key::generate(),
    );

    bootstrap::ensure_admin(&state.users, &config.bootstrap).await;

    let app = app::router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    let grace = config.server.shutdown_grace();
    let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(true);
        })
        .into_future();
    tokio::pin!(server);

    // In-flight requests get `grace` to finish once a signal arrives
    tokio::select! {
        result = &mut server => {
            result.expect("server error");
            return;
        }
        _ = signalled_rx.changed() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.expect("server error"),
        Err(_) => tracing::warn!("shutdown grace period elapsed, dropping open connections"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Gracefully shutdown");
}
