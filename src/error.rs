//! # Errores del Servidor
//! src/error.rs
//!
//! Taxonomía de errores de todo el stack. Cada capa tiene su propio tipo:
//!
//! - `EngineError`: motor de tareas (no iniciado, rechazado, etc.)
//! - `TaskError`: resultado de esperar un `TaskHandle`
//! - `ParseError`: lectura de un request desde el socket
//! - `BindError`: binding de parámetros hacia un handler
//! - `HandlerError`: errores que devuelve un handler, con categoría explícita
//! - `ServerError`: ciclo de vida del servidor

use std::io;
use thiserror::Error;

/// Errores del motor de tareas
///
/// Todos fallan en el punto de llamada y nunca dejan el motor
/// en un estado inconsistente.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Se intentó usar el motor antes de `start()`
    #[error("executor not started, call start() first")]
    NotStarted,

    /// `start()` se llamó dos veces
    #[error("executor already started")]
    AlreadyStarted,

    /// La tarea fue rechazada (cola llena o apagado en curso)
    #[error("task rejected: {0}")]
    Rejected(String),

    /// Tamaño de pool inválido
    #[error("pool size must be greater than 0, got {0}")]
    InvalidPoolSize(usize),

    /// El sistema operativo no pudo crear el thread del worker
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Errores al esperar el resultado de una tarea
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// La tarea hizo panic durante su ejecución
    #[error("task panicked: {0}")]
    Panicked(String),

    /// La tarea nunca se ejecutó (descartada por shutdown_now)
    #[error("task cancelled before completion")]
    Cancelled,

    /// Se agotó el tiempo de espera
    #[error("timed out waiting for task")]
    Timeout,

    /// `invoke_any` recibió un lote vacío
    #[error("no tasks to run")]
    NoTasks,
}

/// Errores durante el parsing de un request
///
/// Cualquiera de ellos hace que la conexión se cierre.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error while reading request: {0}")]
    Io(#[from] io::Error),

    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("header section exceeds {0} bytes")]
    HeadersTooLarge(usize),

    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    #[error("body of {declared} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { declared: u64, limit: u64 },

    #[error("body truncated: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: u64, received: u64 },

    #[error("missing multipart boundary")]
    MissingBoundary,

    #[error("malformed multipart body: {0}")]
    MalformedMultipart(String),

    #[error("uploaded file exceeds limit of {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("form field {name:?} exceeds limit of {limit} bytes")]
    FieldTooLarge { name: String, limit: u64 },
}

impl ParseError {
    /// Indica si el error tiene un motivo que vale la pena contarle al cliente
    ///
    /// EOF, timeouts y errores de I/O cierran la conexión en silencio.
    pub fn is_client_visible(&self) -> bool {
        !matches!(self, ParseError::Io(_) | ParseError::TruncatedBody { .. })
    }
}

/// Errores de binding de parámetros
///
/// El dispatcher los trata siempre como errores del cliente (400).
#[derive(Debug, Error)]
pub enum BindError {
    #[error("missing required parameter: {0}")]
    Missing(String),

    #[error("parameter {name:?}: cannot convert {value:?} to {target}")]
    Conversion {
        name: String,
        value: String,
        target: &'static str,
    },

    #[error("unsupported binding for {name:?}: {detail}")]
    UnsupportedShape { name: String, detail: String },

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Categoría de un error de handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    ClientError,
    ServerError,
}

/// Error devuelto por un handler
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Violación de una regla de negocio o input inválido (400)
    #[error("{0}")]
    Client(String),

    /// Acceso denegado (403)
    #[error("{0}")]
    Forbidden(String),

    /// Recurso inexistente (404)
    #[error("{0}")]
    NotFound(String),

    /// Fallo inesperado (500); el detalle solo va al log
    #[error("{0}")]
    Server(String),
}

impl HandlerError {
    pub fn client(message: impl Into<String>) -> Self {
        HandlerError::Client(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        HandlerError::Server(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            HandlerError::Server(_) => ErrorCategory::ServerError,
            _ => ErrorCategory::ClientError,
        }
    }
}

impl From<BindError> for HandlerError {
    fn from(e: BindError) -> Self {
        HandlerError::Client(e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::Server(format!("serialization failed: {}", e))
    }
}

impl From<io::Error> for HandlerError {
    fn from(e: io::Error) -> Self {
        HandlerError::Server(format!("I/O error: {}", e))
    }
}

/// Errores del ciclo de vida del servidor
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
