//! Template rendering backed by MiniJinja.
//! Lookup functions from [`ValueResolver`] are registered into the
//! environment's global namespace so templates can call them directly:
//!
//! ```jinja
//! listen {{ key("nginx/port", "80") }};
//! {% for ns in list("resolvers") %}nameserver {{ ns }}
//! {% endfor %}
//! {% if hexists("limits") %}{% for l in hash("limits") %}{{ l.key }}={{ l.value }}
//! {% endfor %}{% endif %}
//! ```
use crate::error::{Error, Result};
use crate::resolver::ValueResolver;
use minijinja::{context, path_loader, AutoEscape, Environment, ErrorKind, Value};
use std::path::Path;

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders the template file at `path`.
    ///
    /// # Errors
    /// * `Error::TemplateError` if the file cannot be read, parsed or rendered
    fn render_file(&self, path: &Path) -> Result<String>;

    /// Renders inline template text. `name` identifies it in errors.
    fn render_str(&self, name: &str, template: &str) -> Result<String>;
}

/// MiniJinja-based template rendering engine.
pub struct MiniJinjaRenderer {
    /// Environment with the lookup functions already registered
    env: Environment<'static>,
}

impl MiniJinjaRenderer {
    /// Creates a renderer whose templates resolve keys through `resolver`.
    pub fn new(resolver: ValueResolver) -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        // rendered files are configuration, never HTML or JSON documents
        env.set_auto_escape_callback(|_| AutoEscape::None);
        register_functions(&mut env, resolver);
        Self { env }
    }

    fn template_error(path: &Path, source: minijinja::Error) -> Error {
        Error::TemplateError { path: path.to_path_buf(), source }
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render_file(&self, path: &Path) -> Result<String> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Self::template_error(
                path,
                minijinja::Error::new(ErrorKind::TemplateNotFound, format!("cannot read template: {e}")),
            )
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut env = self.env.clone();
        if let Some(dir) = path.parent() {
            env.set_loader(path_loader(dir.to_path_buf()));
        }
        env.add_template_owned(name.clone(), source)
            .map_err(|e| Self::template_error(path, e))?;
        let tmpl = env.get_template(&name).map_err(|e| Self::template_error(path, e))?;
        tmpl.render(context! {}).map_err(|e| Self::template_error(path, e))
    }

    fn render_str(&self, name: &str, template: &str) -> Result<String> {
        let path = Path::new(name);
        let mut env = self.env.clone();
        env.add_template_owned(name.to_string(), template.to_string())
            .map_err(|e| Self::template_error(path, e))?;
        let tmpl = env.get_template(name).map_err(|e| Self::template_error(path, e))?;
        tmpl.render(context! {}).map_err(|e| Self::template_error(path, e))
    }
}

fn lookup_error(err: Error) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

/// Registers the lookup functions under their template names.
///
/// | name      | call                     |
/// |-----------|--------------------------|
/// | `key`     | `key(k, default?)`       |
/// | `keyd`    | `keyd(k, default?)`      |
/// | `list`    | `list(k)`                |
/// | `listd`   | `listd(k)`               |
/// | `listj`   | `listj(k, separator)`    |
/// | `listi`   | `listi(k, index)`        |
/// | `hash`    | `hash(k)`                |
/// | `sexists` | `sexists(k)`             |
/// | `lexists` | `lexists(k)`             |
/// | `hexists` | `hexists(k)`             |
pub fn register_functions(env: &mut Environment<'static>, resolver: ValueResolver) {
    let r = resolver.clone();
    env.add_function("key", move |key: String, default: Option<String>| {
        r.key(&key, default.as_deref())
    });

    let r = resolver.clone();
    env.add_function(
        "keyd",
        move |key: String, default: Option<String>| -> std::result::Result<Value, minijinja::Error> {
            r.key_with_provenance(&key, default.as_deref())
                .map(|found| Value::from_serialize(&found))
                .map_err(lookup_error)
        },
    );

    let r = resolver.clone();
    env.add_function("list", move |key: String| -> std::result::Result<Vec<String>, minijinja::Error> {
        r.list(&key).map_err(lookup_error)
    });

    let r = resolver.clone();
    env.add_function("listd", move |key: String| -> std::result::Result<Value, minijinja::Error> {
        r.list_with_provenance(&key)
            .map(|entries| Value::from_serialize(&entries))
            .map_err(lookup_error)
    });

    let r = resolver.clone();
    env.add_function(
        "listj",
        move |key: String, separator: String| -> std::result::Result<String, minijinja::Error> {
            r.list_joined(&key, &separator).map_err(lookup_error)
        },
    );

    let r = resolver.clone();
    env.add_function(
        "listi",
        move |key: String, index: usize| -> std::result::Result<String, minijinja::Error> {
            r.list_index(&key, index).map_err(lookup_error)
        },
    );

    let r = resolver.clone();
    env.add_function("hash", move |key: String| -> std::result::Result<Value, minijinja::Error> {
        r.hash(&key).map(|pairs| Value::from_serialize(&pairs)).map_err(lookup_error)
    });

    let r = resolver.clone();
    env.add_function("sexists", move |key: String| r.string_exists(&key));
    let r = resolver.clone();
    env.add_function("lexists", move |key: String| r.list_exists(&key));
    let r = resolver;
    env.add_function("hexists", move |key: String| r.hash_exists(&key));
}
