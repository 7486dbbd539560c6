//! # Tipos MIME
//! src/http/mime.rs
//!
//! Inferencia best-effort del `Content-Type` a partir de la extensión
//! de un nombre de archivo, con la tabla de `mime_guess`.

/// Tipo por defecto cuando la extensión no es conocida
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Retorna el tipo MIME asociado a la extensión de `filename`
///
/// # Ejemplo
/// ```
/// use file_exchange_server::http::mime::content_type_for;
///
/// assert_eq!(content_type_for("foto.PNG"), "image/png");
/// assert_eq!(content_type_for("sin-extension"), "application/octet-stream");
/// ```
pub fn content_type_for(filename: &str) -> &'static str {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
}
