use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

use restws::config::Config;
use restws::hub::Hub;
use restws::middleware::auth::JwtKeys;
use restws::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "restws=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();
    print_banner(&config);

    let db = restws::db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");

    let hub = Hub::new(config.hub.clone());

    let state = AppState {
        db,
        hub: hub.clone(),
        jwt: Arc::new(JwtKeys::new(&config.jwt_secret)),
        token_ttl: config.token_ttl(),
    };

    let app = restws::routes::router(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    let actual_port = listener
        .local_addr()
        .expect("failed to get local address")
        .port();
    eprintln!("  \x1b[32m→ listening on 0.0.0.0:{actual_port}\x1b[0m");
    eprintln!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await
        .expect("server error");

    tracing::info!("server stopped");
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    eprintln!();
    eprintln!("  \x1b[1;36mrestws\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mport\x1b[0m         {}", config.port);
    eprintln!("  \x1b[2mdatabase\x1b[0m     {}", config.database_url);
    eprintln!("  \x1b[2mws queue\x1b[0m     {}", config.hub.queue_capacity);
    eprintln!();
}

/// Resolves on Ctrl+C or SIGTERM, after the hub has closed every WebSocket
/// session. Upgraded connections are not drained by axum itself.
async fn shutdown_signal(hub: Hub) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    if let Err(e) = hub.shutdown().await {
        tracing::warn!("websocket shutdown incomplete: {e}");
    }
}
