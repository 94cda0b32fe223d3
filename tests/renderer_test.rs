use std::fs;
use std::sync::Arc;

use confclient::error::Error;
use confclient::renderer::{MiniJinjaRenderer, TemplateRenderer};
use confclient::resolver::ValueResolver;
use confclient::source::MemorySource;
use tempfile::TempDir;

fn renderer() -> MiniJinjaRenderer {
    let source = MemorySource::new()
        .with_string("foo", "bar", "tier1")
        .with_list("dns", &[("10.0.0.1", "site"), ("10.0.0.2", "site")])
        .with_hash("limits", &[("nofile", "4096", "base")]);
    MiniJinjaRenderer::new(ValueResolver::new(Arc::new(source)))
}

#[test]
fn test_key_round_trip() {
    let result = renderer().render_str("inline", r#"{{ key("foo") }}"#).unwrap();
    assert_eq!(result, "bar");
}

#[test]
fn test_key_default_argument() {
    let result = renderer()
        .render_str("inline", r#"{{ key("missing", "fallback") }}|{{ key("missing") }}|"#)
        .unwrap();
    assert_eq!(result, "fallback||");
}

#[test]
fn test_keyd_exposes_source() {
    let result = renderer()
        .render_str("inline", r#"{% set v = keyd("foo") %}{{ v.value }}@{{ v.source }}"#)
        .unwrap();
    assert_eq!(result, "bar@tier1");

    let result = renderer()
        .render_str("inline", r#"{% set v = keyd("missing", "d") %}{{ v.value }}@{{ v.source }}"#)
        .unwrap();
    assert_eq!(result, "d@__DEFAULT__");
}

#[test]
fn test_loops_and_conditionals() {
    let template = "{% for ns in list(\"dns\") %}nameserver {{ ns }}\n{% endfor %}\
{% if hexists(\"limits\") %}{% for l in hash(\"limits\") %}{{ l.key }}={{ l.value }}{% endfor %}{% endif %}\
{% if not sexists(\"nope\") %}|none{% endif %}";
    let result = renderer().render_str("inline", template).unwrap();
    assert_eq!(result, "nameserver 10.0.0.1\nnameserver 10.0.0.2\nnofile=4096|none");
}

#[test]
fn test_listj_and_listi() {
    let result = renderer()
        .render_str("inline", r#"{{ listj("dns", " ") }};{{ listi("dns", 1) }};{{ lexists("dns") }}"#)
        .unwrap();
    assert_eq!(result, "10.0.0.1 10.0.0.2;10.0.0.2;true");
}

#[test]
fn test_missing_list_fails_render() {
    let err = renderer()
        .render_str("inline", r#"{% for x in list("missing") %}{{ x }}{% endfor %}"#)
        .unwrap_err();
    match err {
        Error::TemplateError { path, .. } => assert_eq!(path.to_str(), Some("inline")),
        other => panic!("Expected TemplateError, got {other:?}"),
    }
}

#[test]
fn test_parse_error() {
    let result = renderer().render_str("broken", "{% if %}");
    assert!(matches!(result, Err(Error::TemplateError { .. })));
}

#[test]
fn test_render_file_keeps_trailing_newline_and_includes() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("header.j2"), "# managed\n").unwrap();
    let template = temp_dir.path().join("app.conf.j2");
    fs::write(&template, "{% include \"header.j2\" %}value={{ key(\"foo\") }}\n").unwrap();

    let result = renderer().render_file(&template).unwrap();
    assert_eq!(result, "# managed\nvalue=bar\n");
}

#[test]
fn test_render_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let template = temp_dir.path().join("absent.j2");
    match renderer().render_file(&template) {
        Err(Error::TemplateError { path, .. }) => assert_eq!(path, template),
        other => panic!("Expected TemplateError, got {other:?}"),
    }
}
