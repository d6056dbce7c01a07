mod backend;
mod config;
mod routes;
mod services;
mod state;

use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let backend = backend::BackendClient::new(&config.backend_url, config.backend_timeouts)
        .expect("backend client init failed");
    if config.discord.is_none() {
        tracing::warn!("DISCORD_CLIENT_ID or DISCORD_REDIRECT_URI unset; Discord login disabled");
    }

    let port = config.port;
    let backend_url = config.backend_url.clone();
    let state = state::AppState::new(Arc::new(backend), config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, %backend_url, "addonhub listening");
    axum::serve(listener, app).await.expect("server failed");
}
