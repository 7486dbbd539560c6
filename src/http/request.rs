//! # Requests HTTP/1.1
//! src/http/request.rs
//!
//! Representación de un request ya parseado. La lectura desde el socket
//! vive en `parser.rs`; aquí solo están los datos y sus accessors.
//!
//! ## Componentes
//!
//! 1. **Método**: `GET`, `POST`, ...
//! 2. **Path**: tal como llegó, con query string incluida
//! 3. **Headers**: nombres en minúscula, el último duplicado gana
//! 4. **Body**: texto (requests no multipart)
//! 5. **Parts**: campos y archivos de un body `multipart/form-data`

use super::temp_file::TempFilePart;
use crate::error::ParseError;
use std::collections::HashMap;
use std::fmt;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    PATCH,
    DELETE,
    OPTIONS,
}

impl Method {
    /// Parsea el token de método de la request line
    ///
    /// # Errores
    ///
    /// `ParseError::UnsupportedMethod` si el método no es conocido
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            "OPTIONS" => Ok(Method::OPTIONS),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
        }
    }

    /// Métodos cuyo body se lee por `Content-Length`
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::POST | Method::PUT | Method::PATCH)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Una parte de un body multipart
#[derive(Debug)]
pub enum Part {
    /// Campo de formulario
    Text(String),
    /// Archivo subido, respaldado por un archivo temporal
    File(TempFilePart),
}

impl Part {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(s) => Some(s),
            Part::File(_) => None,
        }
    }
}

/// Request HTTP parseado
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,

    /// Path tal como llegó (puede incluir `?query`)
    path: String,

    headers: HashMap<String, String>,

    body: String,

    parts: HashMap<String, Part>,
}

impl HttpRequest {
    /// Crea un request sin headers ni body
    ///
    /// # Ejemplo
    /// ```
    /// use file_exchange_server::http::{HttpRequest, Method};
    ///
    /// let req = HttpRequest::new(Method::GET, "/items/42?verbose=true")
    ///     .with_header("X-Trace", "abc");
    ///
    /// assert_eq!(req.path_without_query(), "/items/42");
    /// assert_eq!(req.query_string(), Some("verbose=true"));
    /// assert_eq!(req.header("x-trace"), Some("abc"));
    /// ```
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: String::new(),
            parts: HashMap::new(),
        }
    }

    /// Agrega un header; el nombre se guarda en minúscula
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.insert_header(name, value);
        self
    }

    pub(crate) fn insert_header(&mut self, name: &str, value: &str) {
        self.headers
            .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_part(mut self, name: impl Into<String>, part: Part) -> Self {
        self.parts.insert(name.into(), part);
        self
    }

    pub(crate) fn set_parts(&mut self, parts: HashMap<String, Part>) {
        self.parts = parts;
    }

    // === Accessors ===

    pub fn method(&self) -> Method {
        self.method
    }

    /// Path completo, con query string si la hay
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path sin la query string
    pub fn path_without_query(&self) -> &str {
        match self.path.find('?') {
            Some(i) => &self.path[..i],
            None => &self.path,
        }
    }

    /// Query string cruda (sin el `?`)
    pub fn query_string(&self) -> Option<&str> {
        self.path.find('?').map(|i| &self.path[i + 1..])
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Busca un header sin importar mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("multipart/form-data"))
    }

    /// El cliente pidió cerrar la conexión después de este request
    pub fn wants_close(&self) -> bool {
        self.header("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn parts(&self) -> &HashMap<String, Part> {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.get(name)
    }

    /// Retira una parte, transfiriendo su propiedad al llamador
    pub fn take_part(&mut self, name: &str) -> Option<Part> {
        self.parts.remove(name)
    }
}
