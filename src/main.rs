use std::sync::Arc;

use roomboard::{
    app, config::Config, db,
    moderation::{Moderation, PerspectiveClient, ToxicityScorer},
    AppState,
};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let db_pool = db::connect(&config.database_url).await?;

    let scorer = match &config.moderation_api_key {
        Some(api_key) => Some(Arc::new(PerspectiveClient::new(
            config.moderation_url.clone(),
            api_key.clone(),
            config.moderation_timeout,
        )?) as Arc<dyn ToxicityScorer>),
        None => None,
    };
    let moderation = Moderation::new(scorer, config.moderation_threshold, config.moderation_fail_open);

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        db_pool,
        moderation,
        config: Arc::new(config),
    };

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("listening on {bind_addr}");

    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
