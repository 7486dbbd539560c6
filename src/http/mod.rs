//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Implementa el protocolo HTTP/1.1 desde cero, sin librerías de alto
//! nivel. Incluye:
//!
//! - Parsing en streaming de requests (headers, body y multipart)
//! - Archivos temporales para uploads con borrado garantizado
//! - Construcción y serialización de responses
//! - Códigos de estado y tipos MIME
//!
//! ### Formato de Request
//!
//! ```text
//! POST /api/v1/users HTTP/1.1\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 27\r\n
//! \r\n
//! {"name":"Ana","email":"a@b"}
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 13\r\n
//! Connection: keep-alive\r\n
//! \r\n
//! {"ok": true}
//! ```
//!
//! No hay soporte para chunked transfer-encoding ni compresión.

pub mod mime;
pub mod multipart;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod temp_file;

// Permite usar `http::HttpRequest` en vez de `http::request::HttpRequest`
pub use parser::{ParserLimits, RequestParser};
pub use request::{HttpRequest, Method, Part};
pub use response::HttpResponse;
pub use status::StatusCode;
pub use temp_file::TempFilePart;
