//! # Templates de Path
//! src/router/template.rs
//!
//! Un template como `/api/v1/files/{id}/download` se divide por `/` en
//! segmentos literales y variables. Un path coincide si tiene la misma
//! cantidad de segmentos, los literales son idénticos y cada variable
//! recibe un segmento no vacío.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// Template de ruta parseado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// # Ejemplo
    /// ```
    /// use file_exchange_server::router::PathTemplate;
    ///
    /// let t = PathTemplate::parse("/items/{id}");
    /// assert_eq!(
    ///     t.extract("/items/42"),
    ///     Some(vec![("id".to_string(), "42".to_string())])
    /// );
    /// assert_eq!(t.extract("/items/42/x"), None);
    /// ```
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) if !name.is_empty() => Segment::Variable(name.to_string()),
                _ => Segment::Literal(s.to_string()),
            })
            .collect();

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Nombres de las variables en orden de aparición
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Sin variables: solo coincide con su propio texto
    pub fn is_static(&self) -> bool {
        self.variables().next().is_none()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.extract(path).is_some()
    }

    /// Compara segmento a segmento y captura las variables por nombre
    pub fn extract(&self, path: &str) -> Option<Vec<(String, String)>> {
        let actual: Vec<&str> = path.split('/').collect();
        if actual.len() != self.segments.len() {
            return None;
        }

        let mut vars = Vec::new();
        for (segment, value) in self.segments.iter().zip(actual) {
            match segment {
                Segment::Literal(lit) if lit == value => {}
                Segment::Literal(_) => return None,
                Segment::Variable(_) if value.is_empty() => return None,
                Segment::Variable(name) => vars.push((name.clone(), value.to_string())),
            }
        }
        Some(vars)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let t = PathTemplate::parse("/api/v1/users");
        assert!(t.is_static());
        assert!(t.matches("/api/v1/users"));
        assert!(!t.matches("/api/v2/users"));
        assert!(!t.matches("/api/v1/users/"));
    }

    #[test]
    fn test_variables_in_order() {
        let t = PathTemplate::parse("/files/{id}/versions/{rev}");
        assert_eq!(t.variables().collect::<Vec<_>>(), vec!["id", "rev"]);
        assert_eq!(
            t.extract("/files/7/versions/3"),
            Some(vec![
                ("id".to_string(), "7".to_string()),
                ("rev".to_string(), "3".to_string())
            ])
        );
    }

    #[test]
    fn test_segment_count_must_match() {
        let t = PathTemplate::parse("/items/{id}");
        assert!(!t.matches("/items"));
        assert!(!t.matches("/items/42/x"));
    }

    #[test]
    fn test_variable_needs_non_empty_segment() {
        let t = PathTemplate::parse("/items/{id}");
        assert!(!t.matches("/items/"));
    }

    #[test]
    fn test_empty_braces_are_literal() {
        let t = PathTemplate::parse("/odd/{}");
        assert!(t.is_static());
        assert!(t.matches("/odd/{}"));
        assert!(!t.matches("/odd/x"));
    }
}
