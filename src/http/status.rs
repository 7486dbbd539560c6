//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! Códigos que el servidor puede producir:
//!
//! - **2xx**: Éxito (200)
//! - **4xx**: Error del cliente (400, 403, 404, 413)
//! - **5xx**: Error del servidor (500, 503)

/// Códigos de estado HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok = 200,

    /// 400 Bad Request - Request malformado o parámetros inválidos
    BadRequest = 400,

    /// 403 Forbidden - Acceso denegado
    Forbidden = 403,

    /// 404 Not Found - Ruta o recurso inexistente
    NotFound = 404,

    /// 413 Payload Too Large - Body o archivo sobre el límite
    PayloadTooLarge = 413,

    /// 500 Internal Server Error
    InternalServerError = 500,

    /// 503 Service Unavailable - Motor saturado o apagándose
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Valor numérico del código
    ///
    /// # Ejemplo
    /// ```
    /// use file_exchange_server::http::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Reason phrase estándar del código
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// 4xx o 5xx; el servidor cierra la conexión después de responder
    pub fn is_error(&self) -> bool {
        self.as_u16() >= 400
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}
