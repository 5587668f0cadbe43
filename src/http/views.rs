//! Error-page templates.
//!
//! The HTML error responder renders `errors/<view>.html` through a
//! [`ViewRenderer`]. The bundled [`FileViewRenderer`] reads templates from a
//! views directory and substitutes `{{ key }}` placeholders with HTML-escaped
//! values from the top level of the locals object.

use std::path::PathBuf;

use serde_json::Value;

/// Errors raised while rendering a view.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template not found: {0:?}")]
    NotFound(PathBuf),

    #[error("failed to read template {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Renders a named template with a set of locals.
pub trait ViewRenderer: Send + Sync {
    fn render_file(&self, path: &str, locals: &Value) -> Result<String, RenderError>;
}

/// Reads templates from disk on every render.
#[derive(Debug, Clone)]
pub struct FileViewRenderer {
    root: PathBuf,
}

impl FileViewRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ViewRenderer for FileViewRenderer {
    fn render_file(&self, path: &str, locals: &Value) -> Result<String, RenderError> {
        let full = self.root.join(path);
        let template = std::fs::read_to_string(&full).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RenderError::NotFound(full.clone())
            } else {
                RenderError::Io {
                    path: full.clone(),
                    source,
                }
            }
        })?;
        Ok(interpolate(&template, locals))
    }
}

/// Replace `{{key}}` / `{{ key }}` with the escaped local of that name.
/// Unknown keys render as empty strings.
pub(crate) fn interpolate(template: &str, locals: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        if let Some(value) = locals.get(key) {
            out.push_str(&escape_html(&display_value(value)));
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interpolates_and_escapes() {
        let html = interpolate(
            "<h1>{{ code }}</h1><p>{{message}}</p>{{missing}}",
            &json!({ "code": 404, "message": "<gone>" }),
        );
        assert_eq!(html, "<h1>404</h1><p>&lt;gone&gt;</p>");
    }

    #[test]
    fn unterminated_placeholder_is_left_alone() {
        assert_eq!(interpolate("a {{ b", &json!({})), "a {{ b");
    }

    #[test]
    fn missing_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FileViewRenderer::new(dir.path());
        let err = renderer
            .render_file("errors/40X.html", &json!({}))
            .unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
    }

    #[test]
    fn renders_template_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("errors")).unwrap();
        std::fs::write(dir.path().join("errors/50X.html"), "Oops {{ code }}").unwrap();

        let renderer = FileViewRenderer::new(dir.path());
        let html = renderer
            .render_file("errors/50X.html", &json!({ "code": 503 }))
            .unwrap();
        assert_eq!(html, "Oops 503");
    }
}
