//! Tests de integración para el servidor HTTP
//! tests/integration_test.rs
//!
//! Cada test levanta un servidor real en un puerto efímero y le habla
//! HTTP/1.1 crudo por `TcpStream`.

use file_exchange_server::config::Config;
use file_exchange_server::controllers::{FileController, UserController};
use file_exchange_server::server::{RunningServer, Server};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const BOUNDARY: &str = "----ExchangeBoundary7MA4YWxk";

fn test_config() -> Config {
    Config {
        port: 0,
        workers: 8,
        shutdown_timeout_ms: 2_000,
        ..Config::default()
    }
}

fn start_with(config: Config) -> RunningServer {
    let mut server = Server::new(config);
    server
        .register(Arc::new(UserController::new().unwrap()))
        .register(Arc::new(FileController::new()));
    server.start().expect("server should start")
}

fn start() -> RunningServer {
    start_with(test_config())
}

fn connect(server: &RunningServer) -> TcpStream {
    let stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
}

/// Respuesta leída del socket
struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    raw: Vec<u8>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Lee exactamente una respuesta usando su `Content-Length`
fn read_response<R: BufRead>(reader: &mut R) -> RawResponse {
    let mut raw = Vec::new();
    let mut lines = Vec::new();
    loop {
        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line).unwrap();
        assert!(!line.is_empty(), "connection closed before the response head");
        raw.extend_from_slice(&line);
        if line == b"\r\n" {
            break;
        }
        lines.push(String::from_utf8(line).unwrap().trim_end().to_string());
    }

    let status = lines[0].split(' ').nth(1).unwrap().parse().unwrap();
    let headers: HashMap<String, String> = lines[1..]
        .iter()
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let len: usize = headers["content-length"].parse().unwrap();
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).unwrap();
    raw.extend_from_slice(&body);

    RawResponse {
        status,
        headers,
        body,
        raw,
    }
}

/// Envía un request por una conexión nueva y lee la respuesta
fn roundtrip(server: &RunningServer, request: &[u8]) -> RawResponse {
    let mut stream = connect(server);
    stream.write_all(request).unwrap();
    read_response(&mut BufReader::new(stream))
}

fn json_request(method: &str, path: &str, body: &str) -> Vec<u8> {
    format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        body.len(),
        body
    )
    .into_bytes()
}

fn get_request(path: &str) -> Vec<u8> {
    format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path).into_bytes()
}

fn multipart_upload(filename: &str, content: &[u8], description: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"description\"\r\n\r\n");
    body.extend_from_slice(description.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let mut request = format!(
        "POST /api/v1/files/upload HTTP/1.1\r\nHost: localhost\r\nContent-Type: multipart/form-data; boundary={}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        BOUNDARY,
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(&body);
    request
}

fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}

// ==================== Usuarios ====================

#[test]
fn test_create_user_returns_new_id() {
    let server = start();

    let response = roundtrip(
        &server,
        &json_request("POST", "/api/v1/users", r#"{"name":"Ana","email":"ana@example.com"}"#),
    );

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    let json = response.json();
    assert_eq!(json["id"], 1);
    assert_eq!(json["name"], "Ana");
    assert_eq!(json["email"], "ana@example.com");

    server.stop();
}

#[test]
fn test_invalid_user_is_400() {
    let server = start();

    let response = roundtrip(
        &server,
        &json_request("POST", "/api/v1/users", r#"{"name":"Ana","email":"not-an-email"}"#),
    );
    assert_eq!(response.status, 400);
    assert_eq!(response.header("Connection"), Some("close"));

    server.stop();
}

#[test]
fn test_repeated_get_is_byte_identical() {
    let server = start();
    roundtrip(
        &server,
        &json_request("POST", "/api/v1/users", r#"{"name":"Beto","email":"beto@example.com"}"#),
    );

    let first = roundtrip(&server, &get_request("/api/v1/users/1"));
    let second = roundtrip(&server, &get_request("/api/v1/users/1"));

    assert_eq!(first.status, 200);
    assert_eq!(first.raw, second.raw);

    server.stop();
}

#[test]
fn test_differing_literal_segment_is_404() {
    let server = start();

    assert_eq!(roundtrip(&server, &get_request("/api/v1/users")).status, 200);
    assert_eq!(roundtrip(&server, &get_request("/api/v2/users")).status, 404);

    server.stop();
}

#[test]
fn test_path_variable_binding() {
    let server = start();

    let missing = roundtrip(&server, &get_request("/api/v1/users/42"));
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body, b"user 42 not found");

    let not_a_number = roundtrip(&server, &get_request("/api/v1/users/abc"));
    assert_eq!(not_a_number.status, 400);

    server.stop();
}

// ==================== Archivos ====================

#[test]
fn test_multipart_upload_and_download() {
    let temp = tempfile::tempdir().unwrap();
    let uploads = temp.path().join("uploads");
    let server = start_with(Config {
        temp_dir: Some(uploads.clone()),
        ..test_config()
    });

    // Contenido binario que incluye secuencias parecidas al delimitador
    let content: Vec<u8> = (0..100_000u32)
        .map(|i| match i % 97 {
            0 => b'\r',
            1 => b'\n',
            2 | 3 => b'-',
            n => n as u8,
        })
        .collect();

    let uploaded = roundtrip(&server, &multipart_upload("data.bin", &content, "sample"));
    assert_eq!(uploaded.status, 200);
    let meta = uploaded.json();
    assert_eq!(meta["size"], content.len());
    assert_eq!(meta["filename"], "data.bin");
    assert_eq!(meta["description"], "sample");
    assert!(dir_is_empty(&uploads));

    let id = meta["id"].as_u64().unwrap();
    let downloaded = roundtrip(&server, &get_request(&format!("/api/v1/files/{}/download", id)));
    assert_eq!(downloaded.status, 200);
    assert_eq!(downloaded.body, content);
    assert_eq!(
        downloaded.header("Content-Disposition"),
        Some("attachment; filename=\"data.bin\"")
    );

    server.stop();
}

#[test]
fn test_oversized_upload_is_413() {
    let temp = tempfile::tempdir().unwrap();
    let uploads = temp.path().join("uploads");
    let server = start_with(Config {
        temp_dir: Some(uploads.clone()),
        max_file_size: 1024,
        ..test_config()
    });

    let response = roundtrip(&server, &multipart_upload("big.bin", &[7u8; 4096], "too big"));
    assert_eq!(response.status, 413);
    assert!(dir_is_empty(&uploads));

    server.stop();
}

#[test]
fn test_declared_body_over_limit_is_413() {
    let server = start_with(Config {
        max_body_size: 16,
        ..test_config()
    });

    let response = roundtrip(
        &server,
        b"POST /api/v1/users HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 1000\r\n\r\n",
    );
    assert_eq!(response.status, 413);

    server.stop();
}

// ==================== Conexión ====================

#[test]
fn test_part_header_line_breaks_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let uploads = temp.path().join("uploads");
    let server = start_with(Config {
        temp_dir: Some(uploads.clone()),
        ..test_config()
    });

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a\nX-Injected: 1.txt\"\r\nContent-Type: text/plain\nSet-Cookie: session=evil\r\n\r\nhello\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = format!(
        "POST /api/v1/files/upload HTTP/1.1\r\nContent-Type: multipart/form-data; boundary={}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        BOUNDARY,
        body.len(),
        body
    );

    let response = roundtrip(&server, request.as_bytes());
    assert_eq!(response.status, 400);
    assert!(response.header("Set-Cookie").is_none());
    assert!(dir_is_empty(&uploads));

    let list = roundtrip(&server, &get_request("/api/v1/files"));
    assert_eq!(list.json(), serde_json::json!([]));

    server.stop();
}

#[test]
fn test_truncated_body_is_never_dispatched() {
    let server = start();

    let mut stream = connect(&server);
    stream
        .write_all(b"POST /api/v1/users HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"name\":\"Ana\"")
        .unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());

    let list = roundtrip(&server, &get_request("/api/v1/users"));
    assert_eq!(list.json(), serde_json::json!([]));

    server.stop();
}

#[test]
fn test_keep_alive_serves_sequential_requests() {
    let server = start();
    let stream = connect(&server);
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    let create = br#"{"name":"Caro","email":"caro@example.com"}"#;
    writer
        .write_all(
            format!(
                "POST /api/v1/users HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                create.len()
            )
            .as_bytes(),
        )
        .unwrap();
    writer.write_all(create).unwrap();

    let first = read_response(&mut reader);
    assert_eq!(first.status, 200);
    assert_eq!(first.header("Connection"), Some("keep-alive"));

    writer.write_all(b"GET /api/v1/users/1 HTTP/1.1\r\n\r\n").unwrap();
    let second = read_response(&mut reader);
    assert_eq!(second.status, 200);
    assert_eq!(second.json()["name"], "Caro");

    writer
        .write_all(b"GET /api/v1/users HTTP/1.1\r\nConnection: close\r\n\r\n")
        .unwrap();
    let third = read_response(&mut reader);
    assert_eq!(third.header("Connection"), Some("close"));

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());

    server.stop();
}

#[test]
fn test_full_queue_answers_503() {
    // Un worker para el accept loop, uno para la conexión A, cola de 1
    let server = start_with(Config {
        workers: 2,
        queue_capacity: 1,
        ..test_config()
    });

    // A: queda ocupando el segundo worker en keep-alive
    let mut a = connect(&server);
    a.write_all(b"GET /api/v1/users HTTP/1.1\r\n\r\n").unwrap();
    let mut a_reader = BufReader::new(a.try_clone().unwrap());
    assert_eq!(read_response(&mut a_reader).status, 200);

    // B: espera en la cola
    let b = connect(&server);

    // C: no hay lugar
    let mut c = connect(&server);
    let mut rejected = String::new();
    c.read_to_string(&mut rejected).unwrap();
    assert!(rejected.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));

    drop(a_reader);
    drop(a);
    drop(b);
    server.stop();
}

#[test]
fn test_stop_closes_idle_keep_alive_connection() {
    let server = start_with(Config {
        idle_timeout_ms: 30_000,
        ..test_config()
    });

    let stream = connect(&server);
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    writer.write_all(b"GET /api/v1/users HTTP/1.1\r\n\r\n").unwrap();
    let response = read_response(&mut reader);
    assert_eq!(response.header("Connection"), Some("keep-alive"));

    // La conexión queda abierta esperando otro request
    let started = Instant::now();
    assert!(server.stop());
    assert!(started.elapsed() < Duration::from_secs(2));

    let mut rest = Vec::new();
    let _ = reader.read_to_end(&mut rest);
    assert!(rest.is_empty());
}

#[test]
fn test_stop_is_graceful_when_idle() {
    let server = start();
    assert!(server.is_running());
    assert!(server.stop());
    assert!(!server.is_running());
    assert!(TcpStream::connect(server.local_addr()).is_err());
}
