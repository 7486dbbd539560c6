//! # Dispatcher
//! src/dispatcher/mod.rs
//!
//! Convierte un request parseado en una respuesta:
//!
//! ```text
//! HttpRequest → RouteTable::lookup → bind → Endpoint::call → into_response → HttpResponse
//! ```
//!
//! ## Mapeo de errores
//!
//! | Situación                    | Respuesta                |
//! |------------------------------|--------------------------|
//! | Sin ruta                     | 404 `Not Found`          |
//! | `BindError`                  | 400 con el mensaje       |
//! | `HandlerError::Client`       | 400 con el mensaje       |
//! | `HandlerError::Forbidden`    | 403 `Access Denied`      |
//! | `HandlerError::NotFound`     | 404 con el mensaje       |
//! | `HandlerError::Server`/panic | 500 genérico, detalle al log |

pub mod binder;
pub mod reply;
pub mod route_decl;

pub use binder::Args;
pub use reply::{FileReply, Reply};
pub use route_decl::{Controller, Endpoint, ParamKind, ParamSource, ParamSpec, RouteDecl};

use crate::error::HandlerError;
use crate::executor::task::panic_message;
use crate::http::{HttpRequest, HttpResponse, StatusCode};
use crate::router::{RouteTable, RouteTableBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Fase de registro: acumula endpoints de todos los controllers
#[derive(Debug, Default)]
pub struct DispatcherBuilder {
    routes: RouteTableBuilder<Endpoint>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra todas las operaciones de un controller bajo su `base_path`
    pub fn register<C: Controller>(&mut self, controller: Arc<C>) -> &mut Self {
        let base = controller.base_path().trim_end_matches('/').to_string();
        for endpoint in controller.endpoints() {
            self.add(&base, endpoint);
        }
        self
    }

    /// Registra una operación suelta
    pub fn add(&mut self, base_path: &str, endpoint: Endpoint) -> &mut Self {
        let full_path = format!("{}{}", base_path, endpoint.path());
        self.routes.add(endpoint.method(), &full_path, endpoint);
        self
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Congela la tabla de rutas
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            routes: Arc::new(self.routes.build()),
        }
    }
}

/// Despachador inmutable, compartido por todos los workers
#[derive(Debug, Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable<Endpoint>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn routes(&self) -> &RouteTable<Endpoint> {
        &self.routes
    }

    /// Resuelve, bindea, invoca y convierte
    ///
    /// Nunca falla: todo error termina en una respuesta. Las partes
    /// multipart que el handler no tomó siguen en `request` y se borran
    /// cuando el llamador lo descarta.
    pub fn dispatch(&self, request: &mut HttpRequest) -> HttpResponse {
        let Some(found) = self.routes.lookup(request.method(), request.path()) else {
            tracing::debug!(method = %request.method(), path = request.path(), "no route");
            return HttpResponse::not_found();
        };
        let endpoint = found.route.handler();

        let args = match binder::bind(endpoint.params(), request, found.path_vars) {
            Ok(args) => args,
            Err(e) => {
                tracing::debug!(route = %found.route.template(), "binding failed: {}", e);
                return HttpResponse::bad_request(&e.to_string());
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            endpoint.call(args).and_then(reply::into_response)
        }));

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => error_response(e),
            Err(payload) => {
                tracing::error!(
                    route = %found.route.template(),
                    "handler panicked: {}",
                    panic_message(payload.as_ref())
                );
                HttpResponse::server_error()
            }
        }
    }
}

/// Traduce un `HandlerError` a su respuesta canónica
pub fn error_response(error: HandlerError) -> HttpResponse {
    match error {
        HandlerError::Client(msg) => HttpResponse::bad_request(&msg),
        HandlerError::Forbidden(msg) => {
            tracing::debug!("access denied: {}", msg);
            HttpResponse::forbidden()
        }
        HandlerError::NotFound(msg) => HttpResponse::error(StatusCode::NotFound, &msg),
        HandlerError::Server(detail) => {
            tracing::error!("handler failed: {}", detail);
            HttpResponse::server_error()
        }
    }
}
