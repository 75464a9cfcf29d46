use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use insta::assert_snapshot;
use serde_json::json;
use switchyard::{
    ActionController, App, KernelConfig, RenderError, Value, ViewHelper,
};

#[derive(Default)]
struct Copyright;

impl ViewHelper for Copyright {
    fn invoke(&self, args: &[Value]) -> Result<Value, minijinja::Error> {
        let owner = args.first().map(Value::to_string).unwrap_or_default();
        Ok(Value::from(format!("(c) 2024 {owner}")))
    }
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let controllers = dir.path().join("modules/Default/controllers");
    fs::create_dir_all(&controllers).unwrap();
    fs::write(controllers.join("IndexController.rs"), "").unwrap();
    let views = dir.path().join("modules/Default/views/Index");
    fs::create_dir_all(&views).unwrap();
    fs::write(
        views.join("index.jinja"),
        "<h1>{{ title }}</h1>\n<ul>{% for post in posts %}<li>{{ post }}</li>{% endfor %}</ul>\n<footer>{{ copyright(\"Switchyard\") }}</footer>",
    )
    .unwrap();
    fs::write(views.join("raw.jinja"), "{{ raw(\"html\") }} / {{ html }}").unwrap();
    fs::write(views.join("typo.jinja"), "Hello {{ nmae }}").unwrap();
    fs::write(
        views.join("countdown.jinja"),
        "{% for i in range(start, 0, -1) %}{{ i }} {% endfor %}{{ cycler('a', 'b').next() }}",
    )
    .unwrap();
    dir
}

fn config(dir: &tempfile::TempDir) -> KernelConfig {
    let mut config = KernelConfig::default().with_root(dir.path());
    config.view_dir_pattern = Some("modules/%Module%/views/%Controller%".into());
    config
}

fn index_controller() -> ActionController {
    ActionController::new()
        .action("index", |_, ctx| {
            ctx.view.assign("title", "Tom & Jerry")?;
            ctx.view.assign("posts", ["first", "<second>"])?;
            Ok(Some(ctx.render_action(None)?))
        })
        .action("raw", |_, ctx| {
            ctx.view.assign("html", "<b>bold</b>")?;
            Ok(Some(ctx.render_action(None)?))
        })
        .action("countdown", |_, ctx| {
            ctx.view.assign("start", 3)?;
            Ok(Some(ctx.render_action(None)?))
        })
        .action("typo", |_, ctx| {
            ctx.view.assign("name", "world")?;
            let response = ctx.render_action(None)?;
            let undeclared: Vec<String> = ctx
                .view
                .take_diagnostics()
                .into_iter()
                .map(|d| d.variable)
                .collect();
            Ok(Some(response.with_header("X-Undeclared", undeclared.join(","))))
        })
}

#[test]
fn test_rendered_view_with_helper() {
    let dir = fixture();
    let app = App::builder()
        .config(config(&dir))
        .module_controller("default", "index", index_controller)
        .unwrap()
        .plugin::<Copyright>("copyright")
        .unwrap()
        .build()
        .unwrap();

    let mut request = app.request_factory().builder().uri("/").build();
    let response = app.respond(&mut request);
    assert_snapshot!(response.body(), @r"
    <h1>Tom &amp; Jerry</h1>
    <ul><li>first</li><li>&lt;second&gt;</li></ul>
    <footer>(c) 2024 Switchyard</footer>
    ");
}

#[test]
fn test_raw_skips_escaping() {
    let dir = fixture();
    let app = App::builder()
        .config(config(&dir))
        .module_controller("default", "index", index_controller)
        .unwrap()
        .build()
        .unwrap();

    let mut request = app.request_factory().builder().uri("/index/raw").build();
    assert_eq!(
        app.respond(&mut request).body(),
        "<b>bold</b> / &lt;b&gt;bold&lt;&#x2f;b&gt;"
    );
}

#[test]
fn test_undeclared_variable_is_reported_not_fatal() {
    let dir = fixture();
    let app = App::builder()
        .config(config(&dir))
        .module_controller("default", "index", index_controller)
        .unwrap()
        .build()
        .unwrap();

    let mut request = app.request_factory().builder().uri("/index/typo").build();
    let response = app.respond(&mut request);
    assert_eq!(response.body(), "Hello ");
    assert_eq!(response.header("x-undeclared"), Some("nmae"));
}

#[test]
fn test_strict_variables_fail_the_action() {
    let dir = fixture();
    let mut config = config(&dir);
    config.strict_variables = true;
    let app = App::builder()
        .config(config)
        .module_controller("default", "index", index_controller)
        .unwrap()
        .build()
        .unwrap();

    let mut request = app.request_factory().builder().uri("/index/typo").build();
    let err = app.handle(&mut request).unwrap_err();
    let render_err = err
        .controller_error()
        .and_then(|e| e.downcast_ref::<RenderError>())
        .unwrap();
    assert!(matches!(render_err, RenderError::UndeclaredVariable(ref v) if v == "nmae"));
    assert_eq!(
        app.respond(&mut request).status(),
        http::StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_builtin_functions_pass_strict_variables() {
    let dir = fixture();
    let mut config = config(&dir);
    config.strict_variables = true;
    let app = App::builder()
        .config(config)
        .module_controller("default", "index", index_controller)
        .unwrap()
        .build()
        .unwrap();

    let mut request = app.request_factory().builder().uri("/index/countdown").build();
    let response = app.handle(&mut request).unwrap();
    assert_eq!(response.body(), "3 2 1 a");
}

#[test]
fn test_helper_built_once_across_requests() {
    let dir = fixture();
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let app = App::builder()
        .config(config(&dir))
        .module_controller("default", "index", index_controller)
        .unwrap()
        .plugin_factory("copyright", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Copyright)
        })
        .unwrap()
        .build()
        .unwrap();

    let mut raw = app.request_factory().builder().uri("/index/raw").build();
    app.respond(&mut raw);
    assert_eq!(builds.load(Ordering::SeqCst), 0);

    for _ in 0..3 {
        let mut request = app.request_factory().builder().uri("/").build();
        assert!(app.respond(&mut request).is_success());
    }
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_template_is_server_error() {
    let dir = fixture();
    let app = App::builder()
        .config(config(&dir))
        .module_controller("default", "index", || {
            ActionController::new().action("index", |_, ctx| {
                Ok(Some(ctx.render("missing", Some([("a".to_string(), json!(1))].into()))?))
            })
        })
        .unwrap()
        .build()
        .unwrap();

    let mut request = app.request_factory().builder().uri("/").build();
    let err = app.handle(&mut request).unwrap_err();
    assert!(err.to_string().starts_with("template not found: missing"));
}
