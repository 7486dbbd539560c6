//! # Logging
//! src/logging.rs
//!
//! Instala el subscriber de `tracing`. El nivel se controla con `RUST_LOG`
//! (por defecto `info`).

use tracing_subscriber::EnvFilter;

/// Directiva usada cuando `RUST_LOG` no está definida
const DEFAULT_DIRECTIVE: &str = "info";

/// Instala el subscriber global
///
/// Se puede llamar más de una vez: si ya hay un subscriber instalado, la
/// llamada no hace nada y retorna `false`.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .try_init()
        .is_ok()
}
