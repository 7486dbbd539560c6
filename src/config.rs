//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor con soporte para argumentos CLI y variables
//! de entorno. Cada flag tiene su variable equivalente.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./file_exchange_server --port 8080 \
//!   --workers 16 \
//!   --strategy per-task \
//!   --max-file-size 10485760
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 EXECUTION_STRATEGY=pool WORKERS=32 ./file_exchange_server
//! ```

use crate::executor::{EngineConfig, Strategy, WorkerKind};
use crate::http::ParserLimits;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Nombre del subdirectorio de uploads dentro del temp del sistema
const DEFAULT_TEMP_SUBDIR: &str = "file-exchange-temp";

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "file_exchange_server")]
#[command(about = "Servidor HTTP/1.1 concurrente con uploads multipart")]
#[command(version)]
pub struct Config {
    /// Puerto en el que escucha el servidor (0 = efímero)
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    // === Motor de tareas ===

    /// Número de workers del pool
    #[arg(short, long, default_value = "200", env = "WORKERS")]
    pub workers: usize,

    /// Estrategia de ejecución
    #[arg(long, value_enum, default_value = "pool", env = "EXECUTION_STRATEGY")]
    pub strategy: Strategy,

    /// Tipo de worker
    #[arg(long = "worker-kind", value_enum, default_value = "lightweight", env = "WORKER_KIND")]
    pub worker_kind: WorkerKind,

    /// Capacidad de la cola del pool (0 = ilimitada)
    #[arg(long = "queue-capacity", default_value = "0", env = "QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    // === Límites ===

    /// Tamaño máximo de un body en memoria, en bytes
    #[arg(long = "max-body-size", default_value = "5242880", env = "MAX_BODY_SIZE")]
    pub max_body_size: u64,

    /// Tamaño máximo de un archivo subido, en bytes
    #[arg(long = "max-file-size", default_value = "104857600", env = "MAX_FILE_SIZE")]
    pub max_file_size: u64,

    /// Directorio de archivos temporales (por defecto: temp del sistema)
    #[arg(long = "temp-dir", env = "TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    // === Timeouts ===

    /// Tiempo máximo de inactividad de una conexión, en milisegundos
    #[arg(long = "idle-timeout-ms", default_value = "30000", env = "IDLE_TIMEOUT_MS")]
    pub idle_timeout_ms: u64,

    /// Espera máxima del apagado ordenado, en milisegundos
    #[arg(long = "shutdown-timeout-ms", default_value = "10000", env = "SHUTDOWN_TIMEOUT_MS")]
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use file_exchange_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("Workers must be >= 1".to_string());
        }
        // El accept loop ocupa un worker de forma permanente
        if self.strategy == Strategy::Pool && self.workers < 2 {
            return Err("Pool strategy needs at least 2 workers".to_string());
        }

        if self.max_body_size == 0 {
            return Err("Max body size must be > 0".to_string());
        }
        if self.max_file_size == 0 {
            return Err("Max file size must be > 0".to_string());
        }

        if self.idle_timeout_ms == 0 {
            return Err("Idle timeout must be > 0".to_string());
        }

        Ok(())
    }

    /// Directorio de uploads ya resuelto
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_TEMP_SUBDIR))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Parámetros del motor de tareas
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            strategy: self.strategy,
            worker_kind: self.worker_kind,
            pool_size: self.workers,
            queue_capacity: (self.queue_capacity > 0).then_some(self.queue_capacity),
            ..EngineConfig::default()
        }
    }

    /// Límites del parser
    pub fn parser_limits(&self) -> ParserLimits {
        ParserLimits {
            max_body_size: self.max_body_size,
            max_file_size: self.max_file_size,
            temp_dir: self.temp_dir(),
        }
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        let queue = match self.queue_capacity {
            0 => "unbounded".to_string(),
            n => n.to_string(),
        };
        tracing::info!(
            address = %self.address(),
            strategy = ?self.strategy,
            worker_kind = ?self.worker_kind,
            workers = self.workers,
            queue = %queue,
            "network & engine"
        );
        tracing::info!(
            max_body_size = self.max_body_size,
            max_file_size = self.max_file_size,
            temp_dir = %self.temp_dir().display(),
            idle_timeout_ms = self.idle_timeout_ms,
            shutdown_timeout_ms = self.shutdown_timeout_ms,
            "limits & timeouts"
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            workers: 200,
            strategy: Strategy::Pool,
            worker_kind: WorkerKind::Lightweight,
            queue_capacity: 0,
            max_body_size: 5 * 1024 * 1024,
            max_file_size: 100 * 1024 * 1024,
            temp_dir: None,
            idle_timeout_ms: 30_000,
            shutdown_timeout_ms: 10_000,
        }
    }
}
