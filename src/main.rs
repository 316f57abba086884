//! karaoke-host binary entrypoint: restores the session, then serves the REST
//! API, the karaoke display socket and the remote control socket.

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use karaoke_host::{
    DataPaths, Settings, StartupError, api_port, routes,
    services::lifecycle,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let paths = DataPaths::resolve();
    info!(data_dir = %paths.root().display(), "starting karaoke host");
    let settings = Settings::load(paths.config_file());
    let (karaoke_port, remote_port) = (settings.lan_port, settings.remote_port);

    let app_state = AppState::new(paths, settings);
    if let Err(err) = lifecycle::bootstrap(&app_state).await {
        error!(error = %err, "startup aborted");
        return Err(err).context("bootstrapping karaoke host");
    }

    tokio::spawn({
        let state = app_state.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            state.request_shutdown();
        }
    });

    let servers = tokio::try_join!(
        serve(
            "api",
            api_port(),
            routes::api_router(app_state.clone()),
            app_state.clone()
        ),
        serve(
            "karaoke",
            karaoke_port,
            routes::karaoke_router(app_state.clone()),
            app_state.clone()
        ),
        serve(
            "remote",
            remote_port,
            routes::remote_router(app_state.clone()),
            app_state.clone()
        ),
    );

    // Persist and unlock even when a server failed to start.
    app_state.request_shutdown();
    lifecycle::shutdown(&app_state).await;
    servers?;
    info!("karaoke host stopped");
    Ok(())
}

/// Bind `port` on all interfaces and serve `router` until shutdown is requested.
async fn serve(
    role: &'static str,
    port: u16,
    router: Router<()>,
    state: SharedState,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { role, addr, source })?;
    info!(role, %addr, "server listening");

    let app = with_layers(router);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            state.shutdown_requested().await;
            // Open sockets would otherwise keep the server alive.
            state.clients().close_all();
        })
        .await
        .with_context(|| format!("serving {role} server"))?;

    info!(role, "server stopped");
    Ok(())
}

/// Attach cross-cutting middleware layers.
fn with_layers(router: Router<()>) -> Router<()> {
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
