//! # Parser de Requests
//! src/http/parser.rs
//!
//! Lee un request HTTP/1.1 directamente del stream de bytes de la conexión.
//!
//! ## Algoritmo
//!
//! 1. Leer bytes hasta `\r\n\r\n` con un índice de coincidencia de 4
//!    posiciones (no por líneas, así el body binario queda intacto).
//! 2. Request line `METHOD PATH [VERSION]`, luego headers `Nombre: Valor`
//!    (nombres en minúscula, el último duplicado gana).
//! 3. `multipart/form-data`: parsing en streaming de las partes.
//! 4. `POST`/`PUT`/`PATCH` con `content-length`: leer exactamente ese
//!    número de bytes como body.

use super::multipart::{self, header_params, param};
use super::request::{HttpRequest, Method};
use crate::error::ParseError;
use std::io::{self, BufRead, Read};
use std::path::PathBuf;

/// Terminador de la sección de headers
const HEAD_TERMINATOR: &[u8; 4] = b"\r\n\r\n";

/// Tamaño máximo de la sección de headers
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Límites de recursos aplicados al parsear
#[derive(Debug, Clone)]
pub struct ParserLimits {
    /// Máximo de un body en memoria (y de cada campo multipart)
    pub max_body_size: u64,

    /// Máximo de cada archivo subido
    pub max_file_size: u64,

    /// Directorio para los archivos temporales de upload
    pub temp_dir: PathBuf,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_body_size: 5 * 1024 * 1024,
            max_file_size: 100 * 1024 * 1024,
            temp_dir: std::env::temp_dir().join("file-exchange-temp"),
        }
    }
}

/// Parser de requests, reutilizable entre conexiones
#[derive(Debug, Clone, Default)]
pub struct RequestParser {
    limits: ParserLimits,
}

impl RequestParser {
    pub fn new(limits: ParserLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }

    /// Lee un request completo del stream
    ///
    /// # Retorna
    ///
    /// * `Ok(Some(request))` - Request parseado
    /// * `Ok(None)` - El stream terminó antes de un request completo
    /// * `Err(ParseError)` - Request inválido o error de I/O
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use file_exchange_server::http::{Method, RequestParser};
    /// use std::io::Cursor;
    ///
    /// let raw = b"POST /api/v1/users HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}";
    /// let request = RequestParser::default()
    ///     .parse(&mut Cursor::new(&raw[..]))
    ///     .unwrap()
    ///     .unwrap();
    ///
    /// assert_eq!(request.method(), Method::POST);
    /// assert_eq!(request.body(), "{}");
    /// ```
    pub fn parse<R: BufRead>(&self, reader: &mut R) -> Result<Option<HttpRequest>, ParseError> {
        let head = match read_head(reader)? {
            Some(head) => head,
            None => return Ok(None),
        };
        let mut request = parse_head(&String::from_utf8_lossy(&head))?;

        let content_length = match request.header("content-length") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| ParseError::InvalidContentLength(raw.to_string()))?,
            ),
            None => None,
        };

        if request.is_multipart() {
            let boundary = request
                .content_type()
                .and_then(|ct| param(&header_params(ct), "boundary"))
                .filter(|b| !b.is_empty())
                .ok_or(ParseError::MissingBoundary)?;

            let parts = match content_length {
                Some(len) => {
                    let mut limited = reader.by_ref().take(len);
                    let parts = multipart::parse_multipart(&mut limited, &boundary, &self.limits)?;
                    // Epílogo: lo que sobre del body no es parte del siguiente request
                    io::copy(&mut limited, &mut io::sink())?;
                    parts
                }
                None => multipart::parse_multipart(reader, &boundary, &self.limits)?,
            };
            request.set_parts(parts);
            return Ok(Some(request));
        }

        if let Some(len) = content_length {
            if len > self.limits.max_body_size {
                return Err(ParseError::BodyTooLarge {
                    declared: len,
                    limit: self.limits.max_body_size,
                });
            }

            if request.method().carries_body() {
                let body = read_body(reader, len)?;
                request = request.with_body(String::from_utf8_lossy(&body).into_owned());
            } else {
                // El body de un GET/DELETE se descarta, pero se consume
                io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
            }
        }

        Ok(Some(request))
    }
}

/// Lee hasta `\r\n\r\n` y retorna los bytes previos (sin el terminador)
///
/// `Ok(None)` si el stream termina antes del terminador.
pub(crate) fn read_head<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>, ParseError> {
    let mut head = Vec::with_capacity(512);
    let mut matched = 0;

    loop {
        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if available.is_empty() {
            return Ok(None);
        }

        let mut used = 0;
        let mut complete = false;
        for &b in available {
            used += 1;
            head.push(b);
            matched = advance_match(matched, b);
            if matched == HEAD_TERMINATOR.len() {
                complete = true;
                break;
            }
            if head.len() > MAX_HEAD_SIZE {
                return Err(ParseError::HeadersTooLarge(MAX_HEAD_SIZE));
            }
        }
        reader.consume(used);

        if complete {
            head.truncate(head.len() - HEAD_TERMINATOR.len());
            return Ok(Some(head));
        }
    }
}

/// Avanza el índice de coincidencia contra `\r\n\r\n`
///
/// Un `\r` que rompe la secuencia puede ser el inicio de una nueva.
fn advance_match(matched: usize, b: u8) -> usize {
    if b == HEAD_TERMINATOR[matched] {
        matched + 1
    } else if b == b'\r' {
        1
    } else {
        0
    }
}

/// Parsea request line + headers
fn parse_head(head: &str) -> Result<HttpRequest, ParseError> {
    // Líneas vacías antes de la request line se toleran
    let mut lines = head.split("\r\n").skip_while(|l| l.trim().is_empty());

    let request_line = lines.next().unwrap_or("");
    let mut tokens = request_line.split_whitespace();
    let (method, path) = match (tokens.next(), tokens.next()) {
        (Some(method), Some(path)) => (method, path),
        _ => return Err(ParseError::MalformedRequestLine(request_line.to_string())),
    };

    let mut request = HttpRequest::new(Method::parse(method)?, path);
    for line in lines {
        // Líneas sin ':' no son headers; se ignoran
        if let Some((name, value)) = line.split_once(':') {
            request.insert_header(name, value);
        }
    }
    Ok(request)
}

/// Lee exactamente `len` bytes; menos bytes antes del EOF es un error
fn read_body<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>, ParseError> {
    let mut body = Vec::with_capacity(len as usize);
    reader.by_ref().take(len).read_to_end(&mut body)?;

    let received = body.len() as u64;
    if received < len {
        return Err(ParseError::TruncatedBody {
            expected: len,
            received,
        });
    }
    Ok(body)
}
