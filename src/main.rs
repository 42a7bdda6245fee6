//! RAX Upload Server - Entry Point
//!
//! Stores uploaded images and tabular data files on the local filesystem and
//! serves them back over HTTP.

use log::{error, info};
use std::process::ExitCode;

use rax_upload_server::Server;
use rax_upload_server::config::ServerConfig;
use rax_upload_server::utils::logging::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    // env_logger picks up the RUST_LOG environment variable
    setup_logging();

    info!("Launching upload server...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match server.start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
