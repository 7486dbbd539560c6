//! # File Exchange Server - Entry Point
//! src/main.rs
//!
//! Punto de entrada del servidor HTTP/1.1.
//!
//! Lee la configuración (CLI + entorno), registra los controllers de
//! demostración y sirve hasta recibir Ctrl+C.

use file_exchange_server::config::Config;
use file_exchange_server::controllers::{FileController, UserController};
use file_exchange_server::logging;
use file_exchange_server::server::Server;
use std::process;
use std::sync::mpsc;
use std::sync::Arc;

fn main() {
    logging::init();

    let config = Config::new();
    if let Err(e) = config.validate() {
        tracing::error!("invalid configuration: {}", e);
        process::exit(2);
    }
    tracing::info!("file exchange server v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let users = match UserController::new() {
        Ok(users) => users,
        Err(e) => {
            tracing::error!("could not build user controller: {}", e);
            process::exit(1);
        }
    };

    let mut server = Server::new(config);
    server
        .register(Arc::new(users))
        .register(Arc::new(FileController::new()));

    let running = match server.start() {
        Ok(running) => running,
        Err(e) => {
            tracing::error!("fatal: {}", e);
            process::exit(1);
        }
    };

    let (stop_tx, stop_rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    }) {
        tracing::error!("could not install Ctrl+C handler: {}", e);
        running.stop();
        process::exit(1);
    }

    // Bloquea hasta Ctrl+C
    let _ = stop_rx.recv();
    tracing::info!("shutdown signal received");

    if !running.stop() {
        tracing::warn!("some connections did not finish before the shutdown timeout");
    }
}
