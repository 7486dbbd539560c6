//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones y envía cada una al motor de tareas
//! 3. Lee y parsea requests HTTP/1.1 (con keep-alive)
//! 4. Despacha cada request y escribe la respuesta
//!
//! ## Ejemplo
//!
//! ```no_run
//! use file_exchange_server::config::Config;
//! use file_exchange_server::server::Server;
//!
//! let server = Server::new(Config::default()).start().unwrap();
//! println!("listening on {}", server.local_addr());
//! server.stop();
//! ```

mod connection;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use tcp::{RunningServer, Server};
