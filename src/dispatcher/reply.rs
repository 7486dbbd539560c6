//! # Conversión de Respuestas
//! src/dispatcher/reply.rs
//!
//! Lo que devuelve un handler y cómo se traduce a `HttpResponse`:
//!
//! | Reply     | Content-Type                          |
//! |-----------|---------------------------------------|
//! | `Empty`   | `text/plain`, body vacío              |
//! | `Text`    | `text/plain`                          |
//! | `Bytes`   | `application/octet-stream`            |
//! | `Json`    | `application/json`                    |
//! | `File`    | inferido del nombre, como attachment  |

use crate::error::HandlerError;
use crate::http::mime;
use crate::http::{HttpResponse, TempFilePart};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Nombre de descarga cuando no hay otro disponible
pub const DEFAULT_DOWNLOAD_NAME: &str = "download";

/// Valor de retorno de un handler
#[derive(Debug)]
pub enum Reply {
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    /// JSON ya serializado
    Json(String),
    File(FileReply),
}

impl Reply {
    /// Serializa `value` como JSON
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, HandlerError> {
        Ok(Reply::Json(serde_json::to_string(value)?))
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Text(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Reply {
    fn from(bytes: Vec<u8>) -> Self {
        Reply::Bytes(bytes)
    }
}

impl From<FileReply> for Reply {
    fn from(file: FileReply) -> Self {
        Reply::File(file)
    }
}

#[derive(Debug)]
enum FileSource {
    Path(PathBuf),
    Temp(TempFilePart),
    Memory(Vec<u8>),
}

/// Archivo para descargar
#[derive(Debug)]
pub struct FileReply {
    source: FileSource,
    filename: Option<String>,
    content_type: Option<String>,
}

impl FileReply {
    /// Archivo en disco; el nombre por defecto es el del archivo
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        Self {
            source: FileSource::Path(path),
            filename,
            content_type: None,
        }
    }

    /// Upload temporal; se borra después de leerlo
    pub fn from_temp(part: TempFilePart) -> Self {
        let filename = part.filename().map(str::to_string);
        let content_type = part.content_type().map(str::to_string);
        Self {
            source: FileSource::Temp(part),
            filename,
            content_type,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            source: FileSource::Memory(bytes),
            filename: None,
            content_type: None,
        }
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    fn into_response(self) -> Result<HttpResponse, HandlerError> {
        let filename = self
            .filename
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
        let content_type = self
            .content_type
            .unwrap_or_else(|| mime::content_type_for(&filename).to_string());

        let body = match self.source {
            FileSource::Path(path) => fs::read(&path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => HandlerError::NotFound("file not found".to_string()),
                _ => HandlerError::from(e),
            })?,
            FileSource::Temp(part) => {
                let bytes = part.read_to_vec()?;
                // El borrado fallido ya quedó en el log; la respuesta sigue
                let _ = part.release();
                bytes
            }
            FileSource::Memory(bytes) => bytes,
        };

        let disposition = format!(
            "attachment; filename=\"{}\"",
            filename.replace(['"', '\\'], "_")
        );
        Ok(HttpResponse::ok(&content_type, body).with_header("Content-Disposition", &disposition))
    }
}

/// Traduce el valor de retorno de un handler a una respuesta 200
pub fn into_response(reply: Reply) -> Result<HttpResponse, HandlerError> {
    let response = match reply {
        Reply::Empty => HttpResponse::text(""),
        Reply::Text(text) => HttpResponse::text(&text),
        Reply::Bytes(bytes) => HttpResponse::ok(mime::OCTET_STREAM, bytes),
        Reply::Json(json) => HttpResponse::json(&json),
        Reply::File(file) => file.into_response()?,
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::http::StatusCode;
    use std::io::Write;

    #[test]
    fn test_simple_conversions() {
        let empty = into_response(Reply::Empty).unwrap();
        assert_eq!(empty.status(), StatusCode::Ok);
        assert_eq!(empty.content_type(), "text/plain");
        assert!(empty.body().is_empty());

        let text = into_response("hola".into()).unwrap();
        assert_eq!(text.body(), b"hola");

        let bytes = into_response(vec![1u8, 2, 3].into()).unwrap();
        assert_eq!(bytes.content_type(), "application/octet-stream");
    }

    #[test]
    fn test_json_reply() {
        #[derive(Serialize)]
        struct Created {
            id: u64,
            name: &'static str,
        }
        let reply = Reply::json(&Created { id: 1, name: "Ana" }).unwrap();
        let response = into_response(reply).unwrap();

        assert_eq!(response.content_type(), "application/json");
        assert_eq!(response.body(), br#"{"id":1,"name":"Ana"}"#);
    }

    #[test]
    fn test_file_reply_from_bytes_defaults() {
        let response = into_response(FileReply::from_bytes(b"x".to_vec()).into()).unwrap();
        assert_eq!(response.content_type(), "application/octet-stream");
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"download\"")
        );
    }

    #[test]
    fn test_file_reply_mime_from_name() {
        let reply = FileReply::from_bytes(b"%PDF".to_vec()).with_filename("report.pdf");
        let response = into_response(reply.into()).unwrap();
        assert_eq!(response.content_type(), "application/pdf");
    }

    #[test]
    fn test_file_reply_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        fs::File::create(&path).unwrap().write_all(b"png-bytes").unwrap();

        let response = into_response(FileReply::from_path(&path).into()).unwrap();
        assert_eq!(response.content_type(), "image/png");
        assert_eq!(response.body(), b"png-bytes");
        assert_eq!(
            response.header("content-disposition"),
            Some("attachment; filename=\"logo.png\"")
        );
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let err = into_response(FileReply::from_path("/definitely/not/here.txt").into()).unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));
        assert_eq!(err.category(), ErrorCategory::ClientError);
    }

    #[test]
    fn test_temp_file_released_after_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (part, mut file) = TempFilePart::create_in(
            dir.path(),
            Some("notes.txt".into()),
            Some("text/plain".into()),
        )
        .unwrap();
        file.write_all(b"temp content").unwrap();
        let path = part.path().to_path_buf();

        let response = into_response(FileReply::from_temp(part).into()).unwrap();
        assert_eq!(response.body(), b"temp content");
        assert_eq!(response.content_type(), "text/plain");
        assert!(!path.exists());
    }
}
