//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Tabla de rutas `(método, template) → handler`.
//!
//! ## Arquitectura
//!
//! ```text
//! registro (arranque) → RouteTableBuilder → build() → RouteTable (inmutable)
//! ```
//!
//! La tabla se construye una sola vez y después solo se lee, así que
//! muchos workers pueden consultarla a la vez sin locks.
//!
//! ## Búsqueda
//!
//! 1. Se quita la query string del path.
//! 2. Búsqueda exacta por la clave `METHOD:PATH` (O(1) para rutas estáticas).
//! 3. Si falla, recorrido lineal en orden de registro: gana el primer
//!    template del mismo método que coincida.
//!
//! Registrar dos veces la misma clave reemplaza el handler anterior (gana
//! el último) sin cambiar su posición en el orden de recorrido.

pub mod template;

pub use template::PathTemplate;

use crate::http::Method;
use std::collections::HashMap;

/// Una ruta registrada
#[derive(Debug)]
pub struct Route<H> {
    method: Method,
    template: PathTemplate,
    handler: H,
}

impl<H> Route<H> {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Resultado de una búsqueda exitosa
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,

    /// Variables de path capturadas, en orden de aparición
    pub path_vars: Vec<(String, String)>,
}

fn route_key(method: Method, path: &str) -> String {
    format!("{}:{}", method.as_str(), path)
}

/// Acumula rutas durante la fase de registro
#[derive(Debug)]
pub struct RouteTableBuilder<H> {
    routes: Vec<Route<H>>,
    index: HashMap<String, usize>,
}

impl<H> RouteTableBuilder<H> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registra una ruta; una clave repetida reemplaza el handler anterior
    pub fn add(&mut self, method: Method, path: &str, handler: H) -> &mut Self {
        let key = route_key(method, path);
        let route = Route {
            method,
            template: PathTemplate::parse(path),
            handler,
        };

        match self.index.get(&key) {
            Some(&i) => {
                tracing::warn!(route = %key, "route registered twice, last registration wins");
                self.routes[i] = route;
            }
            None => {
                tracing::debug!(route = %key, "route registered");
                self.index.insert(key, self.routes.len());
                self.routes.push(route);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Congela la tabla
    pub fn build(self) -> RouteTable<H> {
        RouteTable {
            routes: self.routes,
            exact: self.index,
        }
    }
}

impl<H> Default for RouteTableBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tabla de rutas inmutable
#[derive(Debug)]
pub struct RouteTable<H> {
    routes: Vec<Route<H>>,
    exact: HashMap<String, usize>,
}

impl<H> RouteTable<H> {
    /// Busca la ruta para `method` + `path` (el path puede traer query)
    pub fn lookup(&self, method: Method, path: &str) -> Option<RouteMatch<'_, H>> {
        let path = path.split('?').next().unwrap_or(path);

        if let Some(&i) = self.exact.get(&route_key(method, path)) {
            let route = &self.routes[i];
            if let Some(path_vars) = route.template.extract(path) {
                return Some(RouteMatch { route, path_vars });
            }
        }

        self.routes
            .iter()
            .filter(|r| r.method == method)
            .find_map(|route| {
                route
                    .template
                    .extract(path)
                    .map(|path_vars| RouteMatch { route, path_vars })
            })
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route<H>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(Method, &str, &'static str)]) -> RouteTable<&'static str> {
        let mut builder = RouteTableBuilder::new();
        for (method, path, name) in entries {
            builder.add(*method, path, *name);
        }
        builder.build()
    }

    #[test]
    fn test_exact_match() {
        let t = table(&[(Method::GET, "/api/v1/users", "list")]);
        let m = t.lookup(Method::GET, "/api/v1/users").unwrap();
        assert_eq!(*m.route.handler(), "list");
        assert!(m.path_vars.is_empty());
    }

    #[test]
    fn test_query_string_is_ignored() {
        let t = table(&[(Method::GET, "/search", "search")]);
        assert!(t.lookup(Method::GET, "/search?q=rust&page=2").is_some());
    }

    #[test]
    fn test_differing_literal_segment_misses() {
        let t = table(&[(Method::GET, "/api/v1/users", "list")]);
        assert!(t.lookup(Method::GET, "/api/v2/users").is_none());
    }

    #[test]
    fn test_method_must_match() {
        let t = table(&[(Method::GET, "/items/{id}", "get")]);
        assert!(t.lookup(Method::DELETE, "/items/1").is_none());
    }

    #[test]
    fn test_path_variable_capture() {
        let t = table(&[(Method::GET, "/items/{id}", "get")]);
        let m = t.lookup(Method::GET, "/items/42").unwrap();
        assert_eq!(m.path_vars, vec![("id".to_string(), "42".to_string())]);
        assert!(t.lookup(Method::GET, "/items/42/x").is_none());
    }

    #[test]
    fn test_exact_route_beats_template() {
        let t = table(&[
            (Method::GET, "/files/{id}", "by_id"),
            (Method::GET, "/files/recent", "recent"),
        ]);
        let m = t.lookup(Method::GET, "/files/recent").unwrap();
        assert_eq!(*m.route.handler(), "recent");
    }

    #[test]
    fn test_overlapping_templates_first_registered_wins() {
        let t = table(&[
            (Method::GET, "/files/{id}", "first"),
            (Method::GET, "/files/{name}", "second"),
        ]);
        let m = t.lookup(Method::GET, "/files/abc").unwrap();
        assert_eq!(*m.route.handler(), "first");
    }

    #[test]
    fn test_duplicate_key_last_wins_keeps_position() {
        let t = table(&[
            (Method::GET, "/a/{x}", "old"),
            (Method::GET, "/a/{y}", "other"),
            (Method::GET, "/a/{x}", "new"),
        ]);
        assert_eq!(t.len(), 2);
        let m = t.lookup(Method::GET, "/a/1").unwrap();
        assert_eq!(*m.route.handler(), "new");
    }
}
