//! # Parsing Multipart en Streaming
//! src/http/multipart.rs
//!
//! Lee un body `multipart/form-data` directamente del stream, sin cargarlo
//! completo a memoria:
//!
//! ```text
//! --B\r\n
//! Content-Disposition: form-data; name="description"\r\n
//! \r\n
//! texto del campo\r\n
//! --B\r\n
//! Content-Disposition: form-data; name="file"; filename="a.png"\r\n
//! Content-Type: image/png\r\n
//! \r\n
//! <bytes binarios>\r\n
//! --B--
//! ```
//!
//! Cada parte se copia en bloques de 8 KiB hasta el delimitador
//! `\r\n--B`. Los campos van a un `String`; los archivos a un
//! `TempFilePart` nuevo.

use super::parser::{read_head, ParserLimits};
use super::request::Part;
use super::temp_file::TempFilePart;
use crate::error::ParseError;
use std::collections::HashMap;
use std::io::{self, BufRead, BufWriter, Read, Write};

/// Tamaño de bloque para copiar el contenido de las partes
const CHUNK_SIZE: usize = 8192;

/// Lee todas las partes hasta el delimitador de cierre `--B--`
pub fn parse_multipart<R: BufRead>(
    reader: &mut R,
    boundary: &str,
    limits: &ParserLimits,
) -> Result<HashMap<String, Part>, ParseError> {
    let opening = format!("--{}", boundary).into_bytes();
    let delimiter = format!("\r\n--{}", boundary).into_bytes();
    let mut parts = HashMap::new();

    // Preámbulo: se descarta todo hasta el primer delimitador
    if !skip_until(reader, &opening)? {
        return Err(malformed("missing opening boundary"));
    }

    loop {
        let mut marker = [0u8; 2];
        read_exact_or_malformed(reader, &mut marker)?;
        match &marker {
            b"--" => break,
            b"\r\n" => {}
            _ => return Err(malformed("unexpected bytes after boundary")),
        }

        let headers = read_part_headers(reader)?;
        let disposition = headers.get("content-disposition").map(String::as_str).unwrap_or("");
        let params = header_params(disposition);
        let name = param(&params, "name");
        let filename = param(&params, "filename");
        let content_type = headers.get("content-type").cloned();

        match (name, filename) {
            (Some(name), Some(filename)) => {
                let file = read_file_part(reader, &delimiter, filename, content_type, limits)?;
                tracing::debug!(field = %name, size = file.size(), "multipart file stored");
                parts.insert(name, Part::File(file));
            }
            (Some(name), None) => {
                let value = read_field_part(reader, &delimiter, &name, limits)?;
                parts.insert(name, Part::Text(value));
            }
            (None, _) => {
                tracing::debug!("skipping multipart section without a name");
                if !skip_until(reader, &delimiter)? {
                    return Err(malformed("unexpected end of multipart body"));
                }
            }
        }
    }

    Ok(parts)
}

fn read_file_part<R: BufRead>(
    reader: &mut R,
    delimiter: &[u8],
    filename: String,
    content_type: Option<String>,
    limits: &ParserLimits,
) -> Result<TempFilePart, ParseError> {
    // El handle es dueño del archivo desde ya: cualquier error lo borra
    let (mut part, file) = TempFilePart::create_in(&limits.temp_dir, Some(filename), content_type)?;
    let mut out = BufWriter::with_capacity(CHUNK_SIZE, file);

    let size = finish(
        copy_until(reader, delimiter, &mut out, Some(limits.max_file_size)),
        || ParseError::FileTooLarge {
            limit: limits.max_file_size,
        },
    )?;
    out.flush()?;

    part.set_size(size);
    Ok(part)
}

fn read_field_part<R: BufRead>(
    reader: &mut R,
    delimiter: &[u8],
    name: &str,
    limits: &ParserLimits,
) -> Result<String, ParseError> {
    let mut value = Vec::new();
    finish(
        copy_until(reader, delimiter, &mut value, Some(limits.max_body_size)),
        || ParseError::FieldTooLarge {
            name: name.to_string(),
            limit: limits.max_body_size,
        },
    )?;
    Ok(String::from_utf8_lossy(&value).into_owned())
}

/// Traduce el resultado de `copy_until` al error de parsing correspondiente
fn finish(
    result: Result<Option<u64>, CopyError>,
    on_limit: impl FnOnce() -> ParseError,
) -> Result<u64, ParseError> {
    match result {
        Ok(Some(n)) => Ok(n),
        Ok(None) => Err(malformed("unexpected end of multipart body")),
        Err(CopyError::Io(e)) => Err(e.into()),
        Err(CopyError::Limit) => Err(on_limit()),
    }
}

/// Descarta bytes hasta el delimitador; `false` si el stream terminó antes
fn skip_until<R: BufRead>(reader: &mut R, delimiter: &[u8]) -> Result<bool, ParseError> {
    match copy_until(reader, delimiter, &mut io::sink(), None) {
        Ok(found) => Ok(found.is_some()),
        Err(CopyError::Io(e)) => Err(e.into()),
        Err(CopyError::Limit) => Err(malformed("multipart section too large")),
    }
}

fn malformed(msg: &str) -> ParseError {
    ParseError::MalformedMultipart(msg.to_string())
}

fn read_exact_or_malformed<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), ParseError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => malformed("unexpected end of multipart body"),
        _ => ParseError::Io(e),
    })
}

/// Headers de una parte, con nombres en minúscula
///
/// Una línea con caracteres de control (salvo tab) se rechaza: su valor
/// podría terminar en un header de respuesta.
fn read_part_headers<R: BufRead>(reader: &mut R) -> Result<HashMap<String, String>, ParseError> {
    // Parte sin headers: la línea en blanco llega de inmediato
    let mut first = [0u8; 2];
    read_exact_or_malformed(reader, &mut first)?;
    if &first == b"\r\n" {
        return Ok(HashMap::new());
    }

    let mut rest = (&first[..]).chain(&mut *reader);
    let head = read_head(&mut rest)?.ok_or_else(|| malformed("unterminated part headers"))?;
    let text = String::from_utf8_lossy(&head);

    let mut headers = HashMap::new();
    for line in text.split("\r\n") {
        if line.chars().any(|c| c != '\t' && c.is_control()) {
            return Err(malformed("control character in part header"));
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
    }
    Ok(headers)
}

// === Parámetros de headers ===

/// Separa los parámetros `clave=valor` de un header como
/// `form-data; name="file"; filename="a;b.png"`
///
/// Respeta comillas (un `;` entre comillas no separa), quita las comillas
/// del valor y pasa las claves a minúscula. El primer segmento (el tipo)
/// se omite.
pub fn header_params(value: &str) -> Vec<(String, String)> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in value.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
        .iter()
        .skip(1)
        .filter_map(|seg| seg.split_once('='))
        .map(|(k, v)| {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(v);
            (k.trim().to_ascii_lowercase(), v.to_string())
        })
        .collect()
}

/// Busca un parámetro por nombre exacto (`name` nunca coincide con `filename`)
pub fn param(params: &[(String, String)], key: &str) -> Option<String> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

// === Copia hasta delimitador ===

enum CopyError {
    Io(io::Error),
    Limit,
}

impl From<io::Error> for CopyError {
    fn from(e: io::Error) -> Self {
        CopyError::Io(e)
    }
}

/// Tabla de fallos de KMP para `pattern`
fn failure_table(pattern: &[u8]) -> Vec<usize> {
    let mut fail = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = fail[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        fail[i] = k;
    }
    fail
}

/// Copia de `reader` a `out` hasta encontrar `delimiter`
///
/// El delimitador se consume pero no se copia. Retorna `Ok(Some(n))` con
/// los bytes copiados, `Ok(None)` si el stream terminó antes del
/// delimitador, o `CopyError::Limit` si se copiarían más de `limit` bytes.
///
/// Los bytes que coinciden parcialmente con el delimitador siempre son un
/// prefijo de él, así que no hace falta guardarlos aparte.
fn copy_until<R: BufRead, W: Write>(
    reader: &mut R,
    delimiter: &[u8],
    out: &mut W,
    limit: Option<u64>,
) -> Result<Option<u64>, CopyError> {
    let fail = failure_table(delimiter);
    let mut matched = 0;
    let mut chunk: Vec<u8> = Vec::with_capacity(CHUNK_SIZE);
    let mut written: u64 = 0;

    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if buf.is_empty() {
            flush_chunk(&mut chunk, out, &mut written, limit)?;
            return Ok(None);
        }

        let mut used = 0;
        let mut found = false;
        for &b in buf {
            used += 1;
            while matched > 0 && b != delimiter[matched] {
                let keep = fail[matched - 1];
                chunk.extend_from_slice(&delimiter[..matched - keep]);
                matched = keep;
            }
            if b == delimiter[matched] {
                matched += 1;
                if matched == delimiter.len() {
                    found = true;
                    break;
                }
            } else {
                chunk.push(b);
            }
            if chunk.len() >= CHUNK_SIZE {
                flush_chunk(&mut chunk, out, &mut written, limit)?;
            }
        }
        reader.consume(used);

        if found {
            flush_chunk(&mut chunk, out, &mut written, limit)?;
            return Ok(Some(written));
        }
    }
}

fn flush_chunk<W: Write>(
    chunk: &mut Vec<u8>,
    out: &mut W,
    written: &mut u64,
    limit: Option<u64>,
) -> Result<(), CopyError> {
    if chunk.is_empty() {
        return Ok(());
    }
    let total = *written + chunk.len() as u64;
    if limit.is_some_and(|max| total > max) {
        return Err(CopyError::Limit);
    }
    out.write_all(chunk)?;
    *written = total;
    chunk.clear();
    Ok(())
}
