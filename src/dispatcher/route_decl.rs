//! # Declaración de Rutas
//! src/dispatcher/route_decl.rs
//!
//! Interfaz de registro que usan los controllers: cada operación declara
//! verbo, path relativo, la lista de parámetros con su fuente y el closure
//! que la atiende.
//!
//! ```
//! use file_exchange_server::dispatcher::{ParamKind, Reply, RouteDecl};
//!
//! let endpoint = RouteDecl::get("/{id}")
//!     .path_var("id", ParamKind::Integer)
//!     .query("verbose", ParamKind::Bool)
//!     .handle(|args| {
//!         let id = args.required_integer("id")?;
//!         Ok(Reply::Text(format!("item {}", id)))
//!     });
//!
//! assert_eq!(endpoint.path(), "/{id}");
//! assert_eq!(endpoint.params().len(), 2);
//! ```

use super::binder::Args;
use super::reply::Reply;
use crate::error::HandlerError;
use crate::http::Method;
use std::fmt;
use std::sync::Arc;

/// Closure que atiende una operación
pub type Handler = Box<dyn Fn(Args) -> Result<Reply, HandlerError> + Send + Sync>;

/// De dónde sale el valor de un parámetro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    PathVar,
    Query,
    Header,
    Body,
    Part,
}

/// Forma a la que se convierte el valor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Integer,
    Float,
    Bool,
    Json,
    File,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Text => "text",
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
            ParamKind::Json => "json",
            ParamKind::File => "file",
        }
    }
}

/// Un parámetro declarado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub source: ParamSource,
    pub kind: ParamKind,
}

/// Builder de una operación, todavía sin handler
#[derive(Debug)]
pub struct RouteDecl {
    method: Method,
    path: String,
    params: Vec<ParamSpec>,
}

impl RouteDecl {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            params: Vec::new(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    fn param(mut self, name: &str, source: ParamSource, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            source,
            kind,
        });
        self
    }

    /// Variable `{name}` del template
    pub fn path_var(self, name: &str, kind: ParamKind) -> Self {
        self.param(name, ParamSource::PathVar, kind)
    }

    /// Parámetro de query string (o de body form-urlencoded)
    pub fn query(self, name: &str, kind: ParamKind) -> Self {
        self.param(name, ParamSource::Query, kind)
    }

    /// Header, buscado sin importar mayúsculas
    pub fn header(self, name: &str) -> Self {
        self.param(name, ParamSource::Header, ParamKind::Text)
    }

    /// Body completo, como texto o JSON
    pub fn body(self, name: &str, kind: ParamKind) -> Self {
        self.param(name, ParamSource::Body, kind)
    }

    /// Parte de un body multipart
    pub fn part(self, name: &str, kind: ParamKind) -> Self {
        self.param(name, ParamSource::Part, kind)
    }

    /// Completa la declaración con el closure que la atiende
    pub fn handle<F>(self, handler: F) -> Endpoint
    where
        F: Fn(Args) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        Endpoint {
            method: self.method,
            path: self.path,
            params: self.params,
            handler: Box::new(handler),
        }
    }
}

/// Operación completa lista para registrar
pub struct Endpoint {
    method: Method,
    path: String,
    params: Vec<ParamSpec>,
    handler: Handler,
}

impl Endpoint {
    pub fn method(&self) -> Method {
        self.method
    }

    /// Path relativo al `base_path` del controller
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn call(&self, args: Args) -> Result<Reply, HandlerError> {
        (self.handler)(args)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Componente de negocio que expone operaciones HTTP
///
/// Recibe `Arc<Self>` para que cada closure pueda guardar una referencia
/// compartida al controller.
pub trait Controller: Send + Sync + 'static {
    /// Prefijo común de todas sus rutas (ej: `/api/v1/users`)
    fn base_path(&self) -> &str;

    fn endpoints(self: Arc<Self>) -> Vec<Endpoint>;
}
