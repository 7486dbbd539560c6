//! # Loop por Conexión
//! src/server/connection.rs
//!
//! Atiende una conexión aceptada de principio a fin. Corre como una tarea
//! del motor:
//!
//! ```text
//! loop {
//!     parse → dispatch → decidir keep-alive → escribir respuesta
//! } mientras keep-alive && servidor corriendo
//! ```
//!
//! Dentro de una conexión los requests se atienden en orden estricto: la
//! respuesta se escribe completa antes de parsear el siguiente request.
//!
//! Cada conexión se anota en un registro compartido y se marca como
//! ociosa mientras espera el primer byte del siguiente request. Al detener
//! el servidor, las ociosas se cierran en el acto; las que están a mitad de
//! un request terminan su respuesta con `Connection: close`.

use crate::dispatcher::Dispatcher;
use crate::error::ParseError;
use crate::executor;
use crate::http::{HttpResponse, RequestParser};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Máximo de bytes descartados después de rechazar un request
const DRAIN_LIMIT: u64 = 1024 * 1024;

/// Espera máxima por bytes a descartar
const DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

/// Estado compartido por el accept loop y todas las conexiones
#[derive(Debug)]
pub(crate) struct ServerContext {
    pub dispatcher: Dispatcher,
    pub parser: RequestParser,
    pub idle_timeout: Duration,
    running: AtomicBool,
    connections: ConnectionRegistry,
}

impl ServerContext {
    pub fn new(dispatcher: Dispatcher, parser: RequestParser, idle_timeout: Duration) -> Self {
        Self {
            dispatcher,
            parser,
            idle_timeout,
            running: AtomicBool::new(true),
            connections: ConnectionRegistry::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Marca el servidor como detenido; retorna si estaba corriendo
    pub fn mark_stopped(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    /// Cierra las conexiones que esperan su siguiente request
    ///
    /// Debe llamarse después de `mark_stopped`. Retorna cuántas se cerraron.
    pub fn close_idle_connections(&self) -> usize {
        self.connections.close_idle()
    }

    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    #[cfg(test)]
    fn idle_connections(&self) -> usize {
        self.connections.lock().values().filter(|c| c.idle).count()
    }
}

// === Registro de conexiones ===

#[derive(Debug)]
struct Tracked {
    stream: TcpStream,
    idle: bool,
}

/// Copias de los sockets abiertos, para poder cerrarlos desde `stop()`
#[derive(Debug, Default)]
struct ConnectionRegistry {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, Tracked>>,
}

impl ConnectionRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Tracked>> {
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Anota una copia del socket; `None` si no se pudo clonar
    fn register(&self, stream: &TcpStream) -> Option<u64> {
        let copy = match stream.try_clone() {
            Ok(copy) => copy,
            Err(e) => {
                tracing::debug!("connection not tracked: {}", e);
                return None;
            }
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            id,
            Tracked {
                stream: copy,
                idle: false,
            },
        );
        Some(id)
    }

    fn set_idle(&self, id: u64, idle: bool) {
        if let Some(conn) = self.lock().get_mut(&id) {
            conn.idle = idle;
        }
    }

    fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }

    fn close_idle(&self) -> usize {
        let open = self.lock();
        let mut closed = 0;
        for conn in open.values().filter(|c| c.idle) {
            if conn.stream.shutdown(Shutdown::Both).is_ok() {
                closed += 1;
            }
        }
        closed
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Registro de una conexión; se borra al salir del loop
struct Registration<'a> {
    registry: &'a ConnectionRegistry,
    id: Option<u64>,
}

impl<'a> Registration<'a> {
    fn new(registry: &'a ConnectionRegistry, stream: &TcpStream) -> Self {
        Self {
            registry,
            id: registry.register(stream),
        }
    }

    fn set_idle(&self, idle: bool) {
        if let Some(id) = self.id {
            self.registry.set_idle(id, idle);
        }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.registry.remove(id);
        }
    }
}

/// Atiende la conexión hasta que se cierre; nunca propaga errores
pub(crate) fn handle_connection(stream: TcpStream, ctx: &ServerContext) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::debug!(peer = %peer, "connection opened");

    match serve(stream, ctx) {
        Ok(served) => tracing::debug!(peer = %peer, requests = served, "connection closed"),
        Err(e) if is_timeout(&e) => {
            tracing::warn!(peer = %peer, "connection idle for too long, closing")
        }
        Err(e) => tracing::debug!(peer = %peer, "connection closed with error: {}", e),
    }
}

fn serve(stream: TcpStream, ctx: &ServerContext) -> io::Result<usize> {
    stream.set_read_timeout(Some(ctx.idle_timeout))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let registration = Registration::new(&ctx.connections, &stream);
    let mut writer = stream;
    let mut served = 0;

    loop {
        // Ociosa hasta que llegue el primer byte del siguiente request
        registration.set_idle(true);
        if !ctx.is_running() {
            return Ok(served);
        }
        let waiting = reader.fill_buf().map(|buf| buf.is_empty());
        registration.set_idle(false);
        match waiting {
            Ok(true) => return Ok(served),
            Ok(false) => {}
            Err(e) if !ctx.is_running() => {
                tracing::debug!("idle connection closed by shutdown: {}", e);
                return Ok(served);
            }
            Err(e) => return Err(e),
        }

        let mut request = match ctx.parser.parse(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(served),
            Err(ParseError::Io(e)) => return Err(e),
            Err(e) => {
                if reject(&mut writer, &e) {
                    drain(&mut reader);
                }
                return Ok(served);
            }
        };

        let started = Instant::now();
        let response = ctx.dispatcher.dispatch(&mut request);
        let keep_alive =
            !request.wants_close() && !response.status().is_error() && ctx.is_running();

        tracing::debug!(
            method = %request.method(),
            path = request.path(),
            status = response.status().as_u16(),
            latency_ms = %format!("{:.2}", started.elapsed().as_secs_f64() * 1000.0),
            "request served"
        );
        // Libera las partes multipart que nadie tomó
        drop(request);

        response.write_to(&mut writer, keep_alive)?;
        served += 1;

        if !keep_alive || executor::cancellation_requested() {
            return Ok(served);
        }
    }
}

/// Respuesta de mejor esfuerzo para un request que no se pudo parsear
///
/// Retorna `true` si se escribió una respuesta.
fn reject(writer: &mut TcpStream, error: &ParseError) -> bool {
    if !error.is_client_visible() {
        tracing::debug!("dropping unparseable request: {}", error);
        return false;
    }
    tracing::debug!("rejecting request: {}", error);

    let response = match error {
        ParseError::BodyTooLarge { .. }
        | ParseError::FileTooLarge { .. }
        | ParseError::FieldTooLarge { .. } => HttpResponse::payload_too_large(&error.to_string()),
        _ => HttpResponse::bad_request(&error.to_string()),
    };
    if response.write_to(writer, false).is_err() {
        return false;
    }
    let _ = writer.shutdown(Shutdown::Write);
    true
}

/// Descarta lo que quede del request rechazado antes de cerrar
///
/// Cerrar con datos sin leer en el socket hace que el kernel envíe RST, y
/// el cliente puede perder la respuesta que ya se le escribió.
fn drain(reader: &mut BufReader<TcpStream>) {
    if reader.get_ref().set_read_timeout(Some(DRAIN_TIMEOUT)).is_ok() {
        let _ = io::copy(&mut reader.by_ref().take(DRAIN_LIMIT), &mut io::sink());
    }
}

/// Rechaza una conexión que el motor no pudo aceptar
pub(crate) fn reject_overloaded(mut stream: TcpStream, peer: Option<SocketAddr>) {
    tracing::warn!(peer = ?peer, "engine rejected connection, answering 503");
    if HttpResponse::service_unavailable()
        .write_to(&mut stream, false)
        .is_ok()
    {
        let _ = stream.shutdown(Shutdown::Write);
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
