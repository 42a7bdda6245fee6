use axum::Router;
use axum::middleware::from_fn;
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::api::{AppState, router};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::middleware::logging::log_request;
use crate::storage::Gatekeeper;

pub struct Server {
    listener: TcpListener,
    app: Router,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Create the storage directories, build the router and bind the listener
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let gatekeeper = Gatekeeper::from_config(&config);
        gatekeeper.prepare_directories().await?;

        let state = AppState::new(gatekeeper, config.public_base_url());
        let app = build_app(state);

        let address = config.listen_socket();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => {
                info!("Server bound to {}", address);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", address, e);
                return Err(ServerError::Bind { address, source: e });
            }
        };

        Ok(Self {
            listener,
            app,
            config: Arc::new(config),
        })
    }

    /// Serve requests until Ctrl-C or SIGTERM
    pub async fn start(self) -> Result<(), ServerError> {
        info!(
            "Upload server running on http://{} (public URL {})",
            self.config.listen_socket(),
            self.config.public_base_url()
        );

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(ServerError::Serve)?;

        info!("Upload server stopped");
        Ok(())
    }
}

/// Router with access logging and permissive CORS on top of the API routes
pub fn build_app(state: AppState) -> Router {
    router(state)
        .layer(from_fn(log_request))
        .layer(CorsLayer::permissive())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}
