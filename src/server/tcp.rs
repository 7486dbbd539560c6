//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Ciclo de vida `Stopped → Listening → Stopped`.
//!
//! `start()` hace bind del listener, construye el motor de tareas y envía
//! el accept loop como una tarea persistente. Cada conexión aceptada es a
//! su vez una tarea nueva en el mismo motor: no hay threads fuera de él.

use super::connection::{self, ServerContext};
use crate::config::Config;
use crate::dispatcher::{Controller, Dispatcher, DispatcherBuilder};
use crate::error::ServerError;
use crate::executor::{self, Executor, ExecutorExt};
use crate::http::RequestParser;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Espera máxima para la conexión que despierta al accept loop
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Pausa tras un error de accept (p. ej. sin descriptores libres)
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

/// Servidor en fase de registro
pub struct Server {
    config: Config,
    dispatcher: DispatcherBuilder,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::builder(),
        }
    }

    /// Registra las rutas de un controller
    pub fn register<C: Controller>(&mut self, controller: Arc<C>) -> &mut Self {
        self.dispatcher.register(controller);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Hace bind, arranca el motor y empieza a aceptar conexiones
    pub fn start(self) -> Result<RunningServer, ServerError> {
        self.config.validate().map_err(ServerError::Config)?;

        let address = self.config.address();
        let listener = TcpListener::bind(&address).map_err(|source| ServerError::Bind {
            addr: address.clone(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: address.clone(),
            source,
        })?;

        let engine = executor::build(&self.config.engine_config())?;
        let route_count = self.dispatcher.route_count();
        let ctx = Arc::new(ServerContext::new(
            self.dispatcher.build(),
            RequestParser::new(self.config.parser_limits()),
            self.config.idle_timeout(),
        ));

        let accept_engine = Arc::clone(&engine);
        let accept_ctx = Arc::clone(&ctx);
        if let Err(e) = engine.execute(move || accept_loop(listener, accept_engine, accept_ctx)) {
            let _ = engine.shutdown_now();
            return Err(e.into());
        }

        tracing::info!(
            addr = %local_addr,
            routes = route_count,
            strategy = ?self.config.strategy,
            "server listening"
        );

        Ok(RunningServer {
            local_addr,
            engine,
            ctx,
            shutdown_timeout: self.config.shutdown_timeout(),
        })
    }
}

/// Servidor escuchando
pub struct RunningServer {
    local_addr: SocketAddr,
    engine: Arc<dyn Executor>,
    ctx: Arc<ServerContext>,
    shutdown_timeout: Duration,
}

impl RunningServer {
    /// Dirección real del listener (útil con puerto 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.ctx.is_running()
    }

    /// Detiene el servidor
    ///
    /// Cierra el accept loop y las conexiones ociosas, apaga el motor de
    /// forma ordenada y espera hasta `shutdown_timeout`; si no terminó,
    /// fuerza el apagado. Retorna `true` si el apagado ordenado terminó a
    /// tiempo.
    pub fn stop(&self) -> bool {
        if !self.ctx.mark_stopped() {
            return self.engine.is_terminated();
        }
        tracing::info!(addr = %self.local_addr, "stopping server");

        // TcpListener no se puede cerrar desde otro thread: se despierta
        // al accept con una conexión propia
        if let Err(e) = TcpStream::connect_timeout(&wake_address(self.local_addr), WAKE_TIMEOUT) {
            tracing::warn!("could not wake accept loop: {}", e);
        }

        let closed = self.ctx.close_idle_connections();
        if closed > 0 {
            tracing::debug!(
                closed,
                open = self.ctx.open_connections(),
                "closed idle keep-alive connections"
            );
        }

        if let Err(e) = self.engine.shutdown() {
            tracing::error!("engine shutdown failed: {}", e);
        }

        if self.engine.await_termination(self.shutdown_timeout) {
            tracing::info!("server stopped");
            return true;
        }

        match self.engine.shutdown_now() {
            Ok(abandoned) => tracing::warn!(
                abandoned = abandoned.len(),
                "graceful shutdown timed out, forced engine shutdown"
            ),
            Err(e) => tracing::error!("forced shutdown failed: {}", e),
        }
        false
    }
}

impl std::fmt::Debug for RunningServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningServer")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("engine", &self.engine.state())
            .finish()
    }
}

/// Dirección para conectarse a uno mismo (un bind `0.0.0.0` no es conectable)
fn wake_address(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

/// Tarea persistente: acepta conexiones y envía cada una al motor
fn accept_loop(listener: TcpListener, engine: Arc<dyn Executor>, ctx: Arc<ServerContext>) {
    tracing::debug!("accept loop started");

    for stream in listener.incoming() {
        if !ctx.is_running() || executor::cancellation_requested() {
            break;
        }

        match stream {
            Ok(stream) => submit_connection(engine.as_ref(), &ctx, stream),
            Err(e) => accept_failed(&e),
        }
    }

    tracing::debug!("accept loop finished");
}

/// Un error de accept suele persistir (EMFILE): se pausa antes de reintentar
fn accept_failed(error: &io::Error) {
    tracing::warn!("failed to accept connection: {}", error);
    thread::sleep(ACCEPT_ERROR_PAUSE);
}

fn submit_connection(engine: &dyn Executor, ctx: &Arc<ServerContext>, stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    // Copia del socket para poder responder 503 si el motor rechaza la tarea
    let fallback = stream.try_clone();

    let task_ctx = Arc::clone(ctx);
    match engine.execute(move || connection::handle_connection(stream, &task_ctx)) {
        Ok(()) => {}
        Err(e) => {
            tracing::debug!("connection task rejected: {}", e);
            match fallback {
                Ok(socket) => connection::reject_overloaded(socket, peer),
                Err(_) => tracing::warn!(peer = ?peer, "engine rejected connection"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Strategy;
    use std::io::{Read, Write};

    fn test_config() -> Config {
        Config {
            port: 0,
            workers: 4,
            shutdown_timeout_ms: 2_000,
            ..Config::default()
        }
    }

    #[test]
    fn test_start_and_stop() {
        let server = Server::new(test_config()).start().unwrap();
        assert!(server.is_running());
        assert_ne!(server.local_addr().port(), 0);

        assert!(server.stop());
        assert!(!server.is_running());
        // Segunda llamada: sin efecto
        assert!(server.stop());
    }

    #[test]
    fn test_unrouted_request_is_404() {
        let server = Server::new(test_config()).start().unwrap();

        let mut client = TcpStream::connect(server.local_addr()).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.write_all(b"GET /nothing HTTP/1.1\r\n\r\n").unwrap();

        let mut buf = String::new();
        client.read_to_string(&mut buf).unwrap();
        assert!(buf.starts_with("HTTP/1.1 404 Not Found\r\n"));

        server.stop();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            workers: 1,
            ..test_config()
        };
        let err = Server::new(config).start().unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = Config {
            port: taken.local_addr().unwrap().port(),
            ..test_config()
        };
        let err = Server::new(config).start().unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[test]
    fn test_per_task_strategy_serves() {
        let config = Config {
            strategy: Strategy::PerTask,
            ..test_config()
        };
        let server = Server::new(config).start().unwrap();

        let mut client = TcpStream::connect(server.local_addr()).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        let mut buf = String::new();
        client.read_to_string(&mut buf).unwrap();
        assert!(buf.starts_with("HTTP/1.1 404"));

        assert!(server.stop());
    }

    #[test]
    fn test_accept_error_pauses() {
        let started = std::time::Instant::now();
        accept_failed(&io::Error::from_raw_os_error(24));
        assert!(started.elapsed() >= ACCEPT_ERROR_PAUSE);
    }

    #[test]
    fn test_wake_address_for_unspecified_bind() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        assert_eq!(wake_address(addr), "127.0.0.1:9000".parse().unwrap());

        let addr: SocketAddr = "10.0.0.5:9000".parse().unwrap();
        assert_eq!(wake_address(addr), addr);
    }
}
