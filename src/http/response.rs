//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! API para construir respuestas HTTP/1.1 y serializarlas al socket.
//!
//! ## Formato en el cable
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 13\r\n
//! Connection: keep-alive\r\n
//! Server: file-exchange-server\r\n
//! X-Custom: value\r\n
//! \r\n
//! {"ok": true}
//! ```
//!
//! Los headers propios de la respuesta van después de los de framing,
//! en orden alfabético, así dos respuestas iguales producen los mismos bytes.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use file_exchange_server::http::{HttpResponse, StatusCode};
//!
//! let response = HttpResponse::json(r#"{"message": "Hello"}"#)
//!     .with_header("X-Request-Id", "abc123");
//!
//! assert_eq!(response.status(), StatusCode::Ok);
//! let bytes = response.to_bytes(true);
//! assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! ```

use super::StatusCode;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Valor del header `Server`
pub const SERVER_NAME: &str = concat!("file-exchange-server/", env!("CARGO_PKG_VERSION"));

/// Headers que escribe el framing; no se duplican desde `headers`
const FRAMING_HEADERS: [&str; 4] = ["content-type", "content-length", "connection", "server"];

/// Respuesta HTTP completa e inmutable una vez construida
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: StatusCode,
    content_type: String,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl HttpResponse {
    /// Respuesta vacía `text/plain`
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// 200 con tipo y body arbitrarios
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self::new(StatusCode::Ok)
            .with_content_type(content_type)
            .with_body_bytes(body)
    }

    /// 200 `text/plain`
    pub fn text(body: &str) -> Self {
        Self::new(StatusCode::Ok).with_body(body)
    }

    /// 200 `application/json`
    pub fn json(body: &str) -> Self {
        Self::new(StatusCode::Ok)
            .with_content_type("application/json")
            .with_body(body)
    }

    /// Error con mensaje en texto plano
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::new(status).with_body(message)
    }

    pub fn not_found() -> Self {
        Self::error(StatusCode::NotFound, "Not Found")
    }

    pub fn bad_request(message: &str) -> Self {
        Self::error(StatusCode::BadRequest, message)
    }

    /// 500 genérico; el detalle nunca llega al cliente
    pub fn server_error() -> Self {
        Self::error(StatusCode::InternalServerError, "Server Error")
    }

    pub fn forbidden() -> Self {
        Self::error(StatusCode::Forbidden, "Access Denied")
    }

    pub fn payload_too_large(message: &str) -> Self {
        Self::error(StatusCode::PayloadTooLarge, message)
    }

    pub fn service_unavailable() -> Self {
        Self::error(StatusCode::ServiceUnavailable, "Service Unavailable")
    }

    // === Builders ===

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = strip_controls(content_type);
        self
    }

    /// Agrega un header; si ya existe, se sobrescribe
    ///
    /// Los caracteres de control se eliminan del nombre y del valor: un
    /// `\r` o `\n` partiría el head de la respuesta.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(strip_controls(name), strip_controls(value));
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.as_bytes().to_vec();
        self
    }

    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    // === Serialización ===

    /// Escribe la respuesta completa en `writer`
    ///
    /// `keep_alive` decide el valor del header `Connection`.
    pub fn write_to<W: Write>(&self, writer: &mut W, keep_alive: bool) -> io::Result<()> {
        writer.write_all(&self.head_bytes(keep_alive))?;
        writer.write_all(&self.body)?;
        writer.flush()
    }

    /// Serializa la respuesta a bytes
    pub fn to_bytes(&self, keep_alive: bool) -> Vec<u8> {
        let mut out = self.head_bytes(keep_alive);
        out.extend_from_slice(&self.body);
        out
    }

    fn head_bytes(&self, keep_alive: bool) -> Vec<u8> {
        let mut head = String::with_capacity(128);
        head.push_str(&format!("HTTP/1.1 {}\r\n", self.status));
        head.push_str(&format!("Content-Type: {}\r\n", self.content_type));
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str(&format!(
            "Connection: {}\r\n",
            if keep_alive { "keep-alive" } else { "close" }
        ));
        head.push_str(&format!("Server: {}\r\n", SERVER_NAME));

        for (name, value) in &self.headers {
            if FRAMING_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            head.push_str(&format!("{}: {}\r\n", name, value));
        }

        head.push_str("\r\n");
        head.into_bytes()
    }

    // === Accessors ===

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Copia de `value` sin caracteres de control (el tab se conserva)
fn strip_controls(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c == '\t' || !c.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_response() {
        let response = HttpResponse::new(StatusCode::Ok);
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.content_type(), "text/plain");
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_canonical_builders() {
        assert_eq!(HttpResponse::not_found().body(), b"Not Found");
        assert_eq!(HttpResponse::server_error().body(), b"Server Error");
        assert_eq!(HttpResponse::forbidden().body(), b"Access Denied");
        assert_eq!(HttpResponse::forbidden().status(), StatusCode::Forbidden);

        let bad = HttpResponse::bad_request("id must be numeric");
        assert_eq!(bad.status(), StatusCode::BadRequest);
        assert_eq!(bad.body(), b"id must be numeric");
    }

    #[test]
    fn test_json_response() {
        let response = HttpResponse::json(r#"{"status":"ok"}"#);
        assert_eq!(response.content_type(), "application/json");
        assert_eq!(response.body(), br#"{"status":"ok"}"#);
    }

    #[test]
    fn test_to_bytes_framing() {
        let response = HttpResponse::text("Test").with_header("X-Custom", "value");
        let text = String::from_utf8(response.to_bytes(true)).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.contains("Server: file-exchange-server/"));
        assert!(text.contains("X-Custom: value\r\n"));
        assert!(text.ends_with("\r\n\r\nTest"));
    }

    #[test]
    fn test_close_connection_header() {
        let text = String::from_utf8(HttpResponse::not_found().to_bytes(false)).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_headers_sorted_and_framing_not_duplicated() {
        let response = HttpResponse::text("x")
            .with_header("Zeta", "1")
            .with_header("Alpha", "2")
            .with_header("content-length", "999");
        let text = String::from_utf8(response.to_bytes(true)).unwrap();

        assert!(text.find("Alpha: 2").unwrap() < text.find("Zeta: 1").unwrap());
        assert_eq!(text.matches("Content-Length").count(), 1);
        assert!(!text.contains("999"));
    }

    #[test]
    fn test_identical_responses_identical_bytes() {
        let a = HttpResponse::json("{}").with_header("B", "1").with_header("A", "2");
        let b = HttpResponse::json("{}").with_header("A", "2").with_header("B", "1");
        assert_eq!(a.to_bytes(true), b.to_bytes(true));
    }

    #[test]
    fn test_header_values_cannot_split_head() {
        let response = HttpResponse::text("x")
            .with_content_type("text/plain\nSet-Cookie: session=evil")
            .with_header("Content-Disposition", "attachment; filename=\"a\r\nX-Injected: 1.txt\"");
        let text = String::from_utf8(response.to_bytes(true)).unwrap();
        let head = text.split("\r\n\r\n").next().unwrap();

        // Cada salto de línea del head es un separador \r\n legítimo
        assert_eq!(head.matches('\n').count(), head.matches("\r\n").count());
        assert!(head.lines().all(|l| !l.starts_with("Set-Cookie") && !l.starts_with("X-Injected")));
        assert!(head.contains("Content-Type: text/plainSet-Cookie: session=evil\r\n"));
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"aX-Injected: 1.txt\"")
        );
    }

    #[test]
    fn test_write_to() {
        let mut sink = Vec::new();
        HttpResponse::ok("application/octet-stream", vec![0, 1, 2, 255])
            .write_to(&mut sink, false)
            .unwrap();
        assert!(sink.ends_with(&[b'\r', b'\n', 0, 1, 2, 255]));
    }
}
