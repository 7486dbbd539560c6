//! # File Exchange Server
//! src/lib.rs
//!
//! Servidor HTTP/1.1 concurrente implementado desde cero: motor de tareas
//! propio, parser en streaming (con uploads multipart a disco) y un
//! dispatcher de rutas declarativo.
//!
//! ## Arquitectura
//!
//! ```text
//! TcpListener → accept loop (tarea) → conexión (tarea) → RequestParser
//!     → Dispatcher (RouteTable + binding) → handler → HttpResponse
//! ```
//!
//! - `executor`: motor de tareas (pool acotado o una tarea por worker)
//! - `http`: tipos del protocolo, parser, multipart y archivos temporales
//! - `router`: templates de path y tabla de rutas inmutable
//! - `dispatcher`: registro de controllers, binding y conversión de respuestas
//! - `server`: ciclo de vida, accept loop y loop por conexión
//! - `config`: CLI y variables de entorno
//! - `controllers`: colaboradores de demostración (usuarios, archivos)
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use file_exchange_server::config::Config;
//! use file_exchange_server::controllers::UserController;
//! use file_exchange_server::server::Server;
//! use std::sync::Arc;
//!
//! let mut server = Server::new(Config::default());
//! server.register(Arc::new(UserController::new().unwrap()));
//!
//! let running = server.start().expect("Error al iniciar servidor");
//! // ...
//! running.stop();
//! ```

pub mod config;
pub mod controllers;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod http;
pub mod logging;
pub mod router;
pub mod server;
