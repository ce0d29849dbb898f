use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use flockhopper_backend::{
    cameras::CameraStore,
    config::Config,
    create_router,
    graphhopper::GraphHopperClient,
    logging::{init_tracing, LogFormat},
    AppState,
};
use tokio::signal;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let cameras = match CameraStore::from_path(&config.camera_data_path) {
        Ok(store) => {
            tracing::info!(
                "loaded {} cameras from {}",
                store.len(),
                config.camera_data_path.display()
            );
            store
        }
        Err(err) => {
            tracing::warn!(
                "camera data unavailable ({}): {err}; continuing without exposure data",
                config.camera_data_path.display()
            );
            CameraStore::unavailable(err.to_string())
        }
    };

    let engine = match GraphHopperClient::new(config.graphhopper.clone()) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("failed to create GraphHopper client: {err}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("routing through GraphHopper at {}", config.graphhopper.endpoint);

    let addr = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!("invalid listen address {addr}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(config, cameras, Arc::new(engine));
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind {addr}: {err}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("starting FlockHopper backend on http://{addr}");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {err}");
        return ExitCode::FAILURE;
    }

    tracing::info!("server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
