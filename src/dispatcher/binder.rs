//! # Binding de Parámetros
//! src/dispatcher/binder.rs
//!
//! Convierte un request en los argumentos declarados por un `Endpoint`.
//!
//! | Fuente    | Formas válidas                     |
//! |-----------|------------------------------------|
//! | path var  | text, integer, float, bool         |
//! | query     | text, integer, float, bool         |
//! | header    | text                               |
//! | body      | text, json                         |
//! | part      | text, integer, file                |
//!
//! Cualquier otra combinación es `BindError::UnsupportedShape`.

use super::route_decl::{ParamKind, ParamSource, ParamSpec};
use crate::error::BindError;
use crate::http::{HttpRequest, Part, TempFilePart};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Valor ya convertido
#[derive(Debug)]
enum Bound {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Json(serde_json::Value),
    File(TempFilePart),
}

/// Argumentos de una invocación
///
/// Un parámetro ausente en el request simplemente no está; las variantes
/// `required_*` lo convierten en `BindError::Missing`.
#[derive(Debug, Default)]
pub struct Args {
    values: HashMap<String, Bound>,
}

impl Args {
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(Bound::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(Bound::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(Bound::Float(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(Bound::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Deserializa un parámetro JSON a `T`
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, BindError> {
        match self.values.get(name) {
            Some(Bound::Json(value)) => T::deserialize(value)
                .map(Some)
                .map_err(|e| BindError::MalformedBody(e.to_string())),
            _ => Ok(None),
        }
    }

    /// Retira un archivo; desde aquí el llamador es su dueño
    pub fn take_file(&mut self, name: &str) -> Option<TempFilePart> {
        match self.values.remove(name) {
            Some(Bound::File(file)) => Some(file),
            Some(other) => {
                self.values.insert(name.to_string(), other);
                None
            }
            None => None,
        }
    }

    pub fn required_text(&self, name: &str) -> Result<&str, BindError> {
        self.text(name).ok_or_else(|| missing(name))
    }

    pub fn required_integer(&self, name: &str) -> Result<i64, BindError> {
        self.integer(name).ok_or_else(|| missing(name))
    }

    pub fn required_float(&self, name: &str) -> Result<f64, BindError> {
        self.float(name).ok_or_else(|| missing(name))
    }

    pub fn required_boolean(&self, name: &str) -> Result<bool, BindError> {
        self.boolean(name).ok_or_else(|| missing(name))
    }

    pub fn required_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, BindError> {
        self.json(name)?.ok_or_else(|| missing(name))
    }

    pub fn required_file(&mut self, name: &str) -> Result<TempFilePart, BindError> {
        self.take_file(name).ok_or_else(|| missing(name))
    }
}

fn missing(name: &str) -> BindError {
    BindError::Missing(name.to_string())
}

/// Resuelve todos los parámetros de `specs` contra el request
///
/// Las partes multipart se retiran del request: su propiedad pasa a `Args`.
pub fn bind(
    specs: &[ParamSpec],
    request: &mut HttpRequest,
    path_vars: Vec<(String, String)>,
) -> Result<Args, BindError> {
    let path_vars: HashMap<String, String> = path_vars.into_iter().collect();
    let query = query_params(request);
    let mut args = Args::default();

    for spec in specs {
        check_shape(spec)?;

        let bound = match spec.source {
            ParamSource::PathVar => path_vars
                .get(&spec.name)
                .map(|raw| convert(spec, raw))
                .transpose()?,
            ParamSource::Query => query
                .get(&spec.name)
                .map(|raw| convert(spec, raw))
                .transpose()?,
            ParamSource::Header => request.header(&spec.name).map(|v| Bound::Text(v.to_string())),
            ParamSource::Body => bind_body(spec, request.body())?,
            ParamSource::Part => match request.take_part(&spec.name) {
                Some(part) => Some(bind_part(spec, part)?),
                None => None,
            },
        };

        if let Some(value) = bound {
            args.values.insert(spec.name.clone(), value);
        }
    }

    Ok(args)
}

fn check_shape(spec: &ParamSpec) -> Result<(), BindError> {
    use ParamKind::*;

    let supported = match spec.source {
        ParamSource::PathVar | ParamSource::Query => matches!(spec.kind, Text | Integer | Float | Bool),
        ParamSource::Header => spec.kind == Text,
        ParamSource::Body => matches!(spec.kind, Text | Json),
        ParamSource::Part => matches!(spec.kind, Text | Integer | File),
    };

    if supported {
        Ok(())
    } else {
        Err(BindError::UnsupportedShape {
            name: spec.name.clone(),
            detail: format!("{} cannot be bound from {:?}", spec.kind.as_str(), spec.source),
        })
    }
}

/// Convierte un valor textual a la forma declarada
fn convert(spec: &ParamSpec, raw: &str) -> Result<Bound, BindError> {
    let conversion_error = || BindError::Conversion {
        name: spec.name.clone(),
        value: raw.to_string(),
        target: spec.kind.as_str(),
    };

    match spec.kind {
        ParamKind::Text => Ok(Bound::Text(raw.to_string())),
        ParamKind::Integer => raw
            .trim()
            .parse()
            .map(Bound::Integer)
            .map_err(|_| conversion_error()),
        ParamKind::Float => raw
            .trim()
            .parse()
            .map(Bound::Float)
            .map_err(|_| conversion_error()),
        ParamKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Bound::Bool(true)),
            "false" => Ok(Bound::Bool(false)),
            _ => Err(conversion_error()),
        },
        ParamKind::Json | ParamKind::File => Err(conversion_error()),
    }
}

fn bind_body(spec: &ParamSpec, body: &str) -> Result<Option<Bound>, BindError> {
    if body.is_empty() {
        return Ok(None);
    }
    match spec.kind {
        ParamKind::Json => serde_json::from_str(body)
            .map(|v| Some(Bound::Json(v)))
            .map_err(|e| BindError::MalformedBody(e.to_string())),
        _ => Ok(Some(Bound::Text(body.to_string()))),
    }
}

fn bind_part(spec: &ParamSpec, part: Part) -> Result<Bound, BindError> {
    match (spec.kind, part) {
        (ParamKind::File, Part::File(file)) => Ok(Bound::File(file)),
        (ParamKind::File, Part::Text(text)) => Err(BindError::Conversion {
            name: spec.name.clone(),
            value: text,
            target: "file",
        }),
        (_, Part::Text(text)) => convert(spec, &text),
        (_, Part::File(_)) => Err(BindError::Conversion {
            name: spec.name.clone(),
            value: "<file>".to_string(),
            target: spec.kind.as_str(),
        }),
    }
}

/// Query string + body form-urlencoded (el body pisa a la query)
fn query_params(request: &HttpRequest) -> HashMap<String, String> {
    let mut params: HashMap<String, String> = request
        .query_string()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    if !request.is_multipart() && is_form_body(request) {
        params.extend(url::form_urlencoded::parse(request.body().as_bytes()).into_owned());
    }
    params
}

fn is_form_body(request: &HttpRequest) -> bool {
    match request.content_type() {
        Some(ct) => ct
            .to_ascii_lowercase()
            .starts_with("application/x-www-form-urlencoded"),
        None => request.body().contains('='),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use serde::Deserialize;

    fn spec(name: &str, source: ParamSource, kind: ParamKind) -> ParamSpec {
        ParamSpec {
            name: name.to_string(),
            source,
            kind,
        }
    }

    #[test]
    fn test_path_var_conversion() {
        let mut req = HttpRequest::new(Method::GET, "/items/42");
        let specs = [spec("id", ParamSource::PathVar, ParamKind::Integer)];
        let args = bind(&specs, &mut req, vec![("id".into(), "42".into())]).unwrap();
        assert_eq!(args.integer("id"), Some(42));
    }

    #[test]
    fn test_conversion_failure() {
        let mut req = HttpRequest::new(Method::GET, "/items/abc");
        let specs = [spec("id", ParamSource::PathVar, ParamKind::Integer)];
        let err = bind(&specs, &mut req, vec![("id".into(), "abc".into())]).unwrap_err();
        assert!(matches!(err, BindError::Conversion { target: "integer", .. }));
    }

    #[test]
    fn test_query_params_decoded() {
        let mut req = HttpRequest::new(Method::GET, "/search?q=hello+world&limit=5&exact=TRUE&ratio=0.5");
        let specs = [
            spec("q", ParamSource::Query, ParamKind::Text),
            spec("limit", ParamSource::Query, ParamKind::Integer),
            spec("exact", ParamSource::Query, ParamKind::Bool),
            spec("ratio", ParamSource::Query, ParamKind::Float),
            spec("absent", ParamSource::Query, ParamKind::Text),
        ];
        let args = bind(&specs, &mut req, vec![]).unwrap();

        assert_eq!(args.text("q"), Some("hello world"));
        assert_eq!(args.integer("limit"), Some(5));
        assert_eq!(args.boolean("exact"), Some(true));
        assert_eq!(args.float("ratio"), Some(0.5));
        assert!(!args.contains("absent"));
        assert!(matches!(args.required_text("absent"), Err(BindError::Missing(_))));
    }

    #[test]
    fn test_form_body_overrides_query() {
        let mut req = HttpRequest::new(Method::POST, "/login?user=query")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("user=body&pass=s%40cret");
        let specs = [
            spec("user", ParamSource::Query, ParamKind::Text),
            spec("pass", ParamSource::Query, ParamKind::Text),
        ];
        let args = bind(&specs, &mut req, vec![]).unwrap();
        assert_eq!(args.text("user"), Some("body"));
        assert_eq!(args.text("pass"), Some("s@cret"));
    }

    #[test]
    fn test_json_body_is_not_form() {
        let mut req = HttpRequest::new(Method::POST, "/x?a=1")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"a":"=2"}"#);
        let specs = [spec("a", ParamSource::Query, ParamKind::Text)];
        let args = bind(&specs, &mut req, vec![]).unwrap();
        assert_eq!(args.text("a"), Some("1"));
    }

    #[test]
    fn test_json_body() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct NewUser {
            name: String,
            email: String,
        }

        let mut req = HttpRequest::new(Method::POST, "/users")
            .with_body(r#"{"name":"Ana","email":"ana@example.com"}"#);
        let specs = [spec("user", ParamSource::Body, ParamKind::Json)];
        let args = bind(&specs, &mut req, vec![]).unwrap();

        let user: NewUser = args.required_json("user").unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(user.email, "ana@example.com");
    }

    #[test]
    fn test_malformed_json_body() {
        let mut req = HttpRequest::new(Method::POST, "/users").with_body("{not json");
        let specs = [spec("user", ParamSource::Body, ParamKind::Json)];
        let err = bind(&specs, &mut req, vec![]).unwrap_err();
        assert!(matches!(err, BindError::MalformedBody(_)));
    }

    #[test]
    fn test_json_shape_mismatch() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Strict {
            id: u32,
        }
        let mut req = HttpRequest::new(Method::POST, "/").with_body(r#"{"id":"nope"}"#);
        let specs = [spec("v", ParamSource::Body, ParamKind::Json)];
        let args = bind(&specs, &mut req, vec![]).unwrap();
        assert!(matches!(args.json::<Strict>("v"), Err(BindError::MalformedBody(_))));
    }

    #[test]
    fn test_header_binding() {
        let mut req = HttpRequest::new(Method::GET, "/").with_header("X-Api-Key", "k1");
        let specs = [spec("x-api-key", ParamSource::Header, ParamKind::Text)];
        let args = bind(&specs, &mut req, vec![]).unwrap();
        assert_eq!(args.text("x-api-key"), Some("k1"));
    }

    #[test]
    fn test_unsupported_shapes() {
        let cases = [
            spec("f", ParamSource::Query, ParamKind::File),
            spec("f", ParamSource::Part, ParamKind::Float),
            spec("f", ParamSource::Header, ParamKind::Json),
            spec("f", ParamSource::Body, ParamKind::Integer),
        ];
        for case in cases {
            let mut req = HttpRequest::new(Method::POST, "/");
            let err = bind(&[case], &mut req, vec![]).unwrap_err();
            assert!(matches!(err, BindError::UnsupportedShape { .. }));
        }
    }

    #[test]
    fn test_parts_move_into_args() {
        let dir = tempfile::tempdir().unwrap();
        let (file, _) = TempFilePart::create_in(dir.path(), Some("a.txt".into()), None).unwrap();
        let path = file.path().to_path_buf();

        let mut req = HttpRequest::new(Method::POST, "/upload")
            .with_part("file", Part::File(file))
            .with_part("count", Part::Text("3".into()));
        let specs = [
            spec("file", ParamSource::Part, ParamKind::File),
            spec("count", ParamSource::Part, ParamKind::Integer),
        ];
        let mut args = bind(&specs, &mut req, vec![]).unwrap();

        assert!(req.parts().is_empty());
        assert_eq!(args.integer("count"), Some(3));
        let taken = args.required_file("file").unwrap();
        assert!(args.take_file("file").is_none());

        drop(args);
        assert!(path.exists());
        drop(taken);
        assert!(!path.exists());
    }

    #[test]
    fn test_text_part_for_file_param_fails() {
        let mut req = HttpRequest::new(Method::POST, "/upload").with_part("file", Part::Text("x".into()));
        let specs = [spec("file", ParamSource::Part, ParamKind::File)];
        let err = bind(&specs, &mut req, vec![]).unwrap_err();
        assert!(matches!(err, BindError::Conversion { target: "file", .. }));
    }
}
